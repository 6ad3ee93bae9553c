use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::{Cart, CartLine, CartOwner};
use crate::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub owner: String,
    pub lines: Vec<CartLine>,
    pub total: Decimal,
}

impl CartView {
    fn new(owner: &CartOwner, cart: Cart) -> Result<Self, ServiceError> {
        let total = cart
            .total()
            .ok_or_else(|| ServiceError::ValidationError("cart total is out of range".into()))?;
        Ok(Self {
            owner: owner.to_string(),
            total,
            lines: cart.lines,
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddItemRequest {
    #[validate(length(min = 1))]
    pub product_id: String,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 10000))]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetQuantityRequest {
    #[validate(range(min = 1, max = 10000))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MergeRequest {
    #[validate(length(min = 1))]
    pub device_id: String,
    #[validate(length(min = 1))]
    pub user_id: String,
}

fn parse_owner(raw: &str) -> Result<CartOwner, ServiceError> {
    raw.parse()
        .map_err(|e: crate::models::cart::InvalidCartOwner| ServiceError::BadRequest(e.to_string()))
}

/// Current cart for `device:<id>` or `user:<id>`
#[utoipa::path(
    get,
    path = "/carts/{owner}",
    params(("owner" = String, Path, description = "device:<id> or user:<id>")),
    responses(
        (status = 200, description = "Cart contents", body = CartView),
        (status = 400, description = "Malformed owner", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = parse_owner(&owner)?;
    let cart = state.services.cart.get(&owner).await?;
    Ok(Json(CartView::new(&owner, cart)?))
}

#[utoipa::path(
    post,
    path = "/carts/{owner}/items",
    params(("owner" = String, Path, description = "device:<id> or user:<id>")),
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartView),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid quantity or inactive product", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let owner = parse_owner(&owner)?;
    let cart = state
        .services
        .cart
        .add_item(&owner, &payload.product_id, payload.quantity)
        .await?;
    Ok(Json(CartView::new(&owner, cart)?))
}

#[utoipa::path(
    put,
    path = "/carts/{owner}/items/{product_id}",
    params(
        ("owner" = String, Path, description = "device:<id> or user:<id>"),
        ("product_id" = String, Path, description = "Product id")
    ),
    request_body = SetQuantityRequest,
    responses((status = 200, description = "Updated cart", body = CartView)),
    tag = "Carts"
)]
pub async fn set_item_quantity(
    State(state): State<AppState>,
    Path((owner, product_id)): Path<(String, String)>,
    Json(payload): Json<SetQuantityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let owner = parse_owner(&owner)?;
    let cart = state
        .services
        .cart
        .set_quantity(&owner, &product_id, payload.quantity)
        .await?;
    Ok(Json(CartView::new(&owner, cart)?))
}

#[utoipa::path(
    delete,
    path = "/carts/{owner}/items/{product_id}",
    params(
        ("owner" = String, Path, description = "device:<id> or user:<id>"),
        ("product_id" = String, Path, description = "Product id")
    ),
    responses((status = 200, description = "Updated cart", body = CartView)),
    tag = "Carts"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    Path((owner, product_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = parse_owner(&owner)?;
    let cart = state.services.cart.remove_item(&owner, &product_id).await?;
    Ok(Json(CartView::new(&owner, cart)?))
}

/// Called by the client after it observes a successful payment redirect
#[utoipa::path(
    post,
    path = "/carts/{owner}/clear",
    params(("owner" = String, Path, description = "device:<id> or user:<id>")),
    responses((status = 204, description = "Cart emptied")),
    tag = "Carts"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let owner = parse_owner(&owner)?;
    state.services.cart.clear(&owner).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Sign-in merge of a device cart into the user's cart
#[utoipa::path(
    post,
    path = "/carts/merge",
    request_body = MergeRequest,
    responses(
        (status = 200, description = "Merged user cart", body = CartView),
        (status = 500, description = "Merge failed; device cart kept", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn merge_carts(
    State(state): State<AppState>,
    Json(payload): Json<MergeRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    payload.validate()?;
    let cart = state
        .services
        .cart
        .merge_on_login(&payload.device_id, &payload.user_id)
        .await?;
    let owner = CartOwner::User(payload.user_id);
    Ok(Json(CartView::new(&owner, cart)?))
}
