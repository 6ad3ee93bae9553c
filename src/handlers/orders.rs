use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::OrderRecord;
use crate::AppState;

/// Fetch one order
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = OrderRecord),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .orders
        .get_by_id(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order with ID {} not found", id)))?;
    Ok(Json(order))
}

/// Order history for one user, newest first
#[utoipa::path(
    get,
    path = "/users/{user_id}/orders",
    params(("user_id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Orders, newest first", body = [OrderRecord])
    ),
    tag = "Orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.orders.list_by_user(&user_id).await?;
    Ok(Json(orders))
}
