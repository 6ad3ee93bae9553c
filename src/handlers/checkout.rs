use axum::{extract::State, response::IntoResponse, Json};

use crate::errors::ServiceError;
use crate::services::checkout::{CheckoutRequest, CheckoutResponse};
use crate::AppState;

/// Start a hosted checkout for a cart snapshot
#[utoipa::path(
    post,
    path = "/checkout/initiate",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Preference created; redirect the buyer", body = CheckoutResponse),
        (status = 400, description = "Empty or invalid cart", body = crate::errors::ErrorResponse),
        (status = 401, description = "Sign-in required", body = crate::errors::ErrorResponse),
        (status = 500, description = "Could not start payment", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn initiate_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state.services.checkout.initiate(payload).await?;
    Ok(Json(response))
}
