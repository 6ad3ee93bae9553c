use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{FulfillmentStatus, OrderRecord, OrderStatus, Product};
use crate::services::admin::{DiscountRequest, ProductInput, RestoreRequest};
use crate::AppState;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderFilter {
    /// pending, approved, rejected or cancelled
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct FulfillmentRequest {
    pub fulfillment_status: FulfillmentStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ActivationRequest {
    pub active: bool,
}

#[utoipa::path(
    get,
    path = "/admin/orders",
    params(OrderFilter),
    responses((status = 200, description = "Orders, newest first", body = [OrderRecord])),
    tag = "Admin"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.admin.list_orders(filter.status).await?;
    Ok(Json(orders))
}

#[utoipa::path(
    put,
    path = "/admin/orders/{id}/fulfillment",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = FulfillmentRequest,
    responses(
        (status = 200, description = "Updated order", body = OrderRecord),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn update_fulfillment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<FulfillmentRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .admin
        .update_fulfillment(id, payload.fulfillment_status)
        .await?;
    Ok(Json(order))
}

#[utoipa::path(
    post,
    path = "/admin/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order cancelled", body = OrderRecord),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already settled", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.admin.cancel_order(id).await?;
    Ok(Json(order))
}

#[utoipa::path(
    post,
    path = "/admin/products/discount",
    request_body = DiscountRequest,
    responses(
        (status = 200, description = "All products discounted", body = [Product]),
        (status = 400, description = "Invalid percent or empty set", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown product; nothing changed", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn apply_discount(
    State(state): State<AppState>,
    Json(payload): Json<DiscountRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.admin.apply_discount_to_set(&payload).await?;
    Ok(Json(products))
}

#[utoipa::path(
    post,
    path = "/admin/products/restore",
    request_body = RestoreRequest,
    responses(
        (status = 200, description = "Original prices restored", body = [Product]),
        (status = 404, description = "Unknown product; nothing changed", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn restore_prices(
    State(state): State<AppState>,
    Json(payload): Json<RestoreRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.admin.restore_prices(&payload).await?;
    Ok(Json(products))
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    request_body = ProductInput,
    responses((status = 200, description = "Saved product", body = Product)),
    tag = "Admin"
)]
pub async fn upsert_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.admin.upsert_product(&id, payload).await?;
    Ok(Json(product))
}

#[utoipa::path(
    put,
    path = "/admin/products/{id}/active",
    params(("id" = String, Path, description = "Product id")),
    request_body = ActivationRequest,
    responses(
        (status = 200, description = "Updated product", body = Product),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Admin"
)]
pub async fn set_product_active(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<ActivationRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state
        .services
        .admin
        .set_product_active(&id, payload.active)
        .await?;
    Ok(Json(product))
}

/// Public catalog lookup
#[utoipa::path(
    get,
    path = "/products/{id}",
    params(("id" = String, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product", body = Product),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state
        .services
        .products
        .get(&id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))?;
    Ok(Json(product))
}
