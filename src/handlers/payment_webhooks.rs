use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bytes::Bytes;
use metrics::counter;
use serde_json::json;
use tracing::{error, info, warn};

use crate::errors::ServiceError;
use crate::payments::webhook::{
    parse_notification, verify_signature, Notification, NotificationQuery,
};
use crate::AppState;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// POST /webhook/payment
#[utoipa::path(
    post,
    path = "/webhook/payment",
    request_body = String,
    responses(
        (status = 200, description = "Notification acknowledged"),
        (status = 400, description = "No payment id or invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Gateway has no such payment", body = crate::errors::ErrorResponse),
        (status = 500, description = "Storage failure; gateway will redeliver", body = crate::errors::ErrorResponse),
        (status = 503, description = "Gateway lookup failed; gateway will redeliver", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let notification = parse_notification(&query, &body).map_err(|e| {
        counter!("storefront_webhook_events_total", 1, "outcome" => "invalid");
        warn!(error = %e, "payment notification rejected");
        ServiceError::BadRequest(e.to_string())
    })?;

    let payment_id = match notification {
        Notification::Payment { payment_id } => payment_id,
        Notification::Ignored { topic } => {
            counter!("storefront_webhook_events_total", 1, "outcome" => "ignored");
            info!(%topic, "notification topic ignored");
            return Ok((
                StatusCode::OK,
                Json(json!({ "status": "ignored", "topic": topic })),
            ));
        }
    };

    if let Some(secret) = state.config.gateway.webhook_secret.as_deref() {
        if let Err(e) = verify_signature(
            secret,
            header(&headers, "x-signature"),
            header(&headers, "x-request-id"),
            Some(&payment_id),
            state.config.gateway.webhook_tolerance_secs,
            chrono::Utc::now().timestamp(),
        ) {
            counter!("storefront_webhook_events_total", 1, "outcome" => "unauthorized");
            warn!(error = %e, %payment_id, "payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    match state.services.reconciler.reconcile(&payment_id).await {
        Ok(outcome) => {
            let record = outcome.record();
            counter!("storefront_webhook_events_total", 1, "outcome" => outcome.label());
            Ok((
                StatusCode::OK,
                Json(json!({
                    "status": "ok",
                    "outcome": outcome.label(),
                    "order_id": record.id,
                    "order_status": record.status,
                })),
            ))
        }
        Err(e) => {
            counter!("storefront_webhook_events_total", 1, "outcome" => "error");
            error!(error = %e, %payment_id, retryable = e.is_retryable(), "payment reconciliation failed");
            Err(e)
        }
    }
}
