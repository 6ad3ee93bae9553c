use async_trait::async_trait;
use reqwest::{Response, StatusCode, Url};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::{
    BackUrls, GatewayError, LooseId, PaymentDetails, PaymentGateway, Preference,
    PreferenceRequest,
};
use crate::config::GatewayConfig;
use crate::models::OrderStatus;

/// Mercado Pago REST client (Checkout Pro preferences + payments lookup).
#[derive(Clone)]
pub struct MercadoPagoClient {
    client: reqwest::Client,
    base_url: Url,
    access_token: String,
}

impl std::fmt::Debug for MercadoPagoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MercadoPagoClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Serialize)]
struct PreferenceBody<'a> {
    items: Vec<PreferenceItemBody<'a>>,
    back_urls: &'a BackUrls,
    auto_return: &'static str,
    external_reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    notification_url: Option<&'a str>,
}

#[derive(Serialize)]
struct PreferenceItemBody<'a> {
    id: &'a str,
    title: &'a str,
    quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    unit_price: Decimal,
    currency_id: &'a str,
}

#[derive(Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: LooseId,
    status: String,
    #[serde(default)]
    external_reference: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    transaction_amount: Option<Decimal>,
    #[serde(default)]
    payer: Option<PayerResponse>,
}

#[derive(Deserialize)]
struct PayerResponse {
    #[serde(default)]
    email: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("http client: {}", e)))?;
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| GatewayError::Unavailable(format!("gateway base url: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            access_token: config.access_token.clone(),
        })
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Unavailable("gateway base url cannot carry a path".into()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_decode() {
        GatewayError::Malformed(err.to_string())
    } else {
        GatewayError::Unavailable(err.to_string())
    }
}

async fn ensure_success(response: Response, subject: &str) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message: String = body.chars().take(200).collect();
    warn!(status = status.as_u16(), subject, "payment gateway returned an error");

    if status == StatusCode::NOT_FOUND {
        Err(GatewayError::NotFound(subject.to_string()))
    } else if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Err(GatewayError::Unavailable(format!("{}: {}", status, message)))
    } else {
        Err(GatewayError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    #[instrument(skip(self, request), fields(correlation = %request.correlation_token))]
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, GatewayError> {
        let body = PreferenceBody {
            items: request
                .items
                .iter()
                .map(|item| PreferenceItemBody {
                    id: &item.id,
                    title: &item.title,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    currency_id: &request.currency,
                })
                .collect(),
            back_urls: &request.back_urls,
            auto_return: "approved",
            external_reference: &request.correlation_token,
            notification_url: request.notification_url.as_deref(),
        };

        let response = self
            .client
            .post(self.endpoint(&["checkout", "preferences"])?)
            .bearer_auth(&self.access_token)
            .header("X-Idempotency-Key", &request.correlation_token)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let created: PreferenceResponse = ensure_success(response, "preference")
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        debug!(preference_id = %created.id, "preference created");
        Ok(Preference {
            id: created.id,
            redirect_url: created.init_point,
        })
    }

    #[instrument(skip(self))]
    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError> {
        let response = self
            .client
            .get(self.endpoint(&["v1", "payments", payment_id])?)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(transport_error)?;

        let payment: PaymentResponse = ensure_success(response, payment_id)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        Ok(PaymentDetails {
            id: payment.id.into_string(),
            status: OrderStatus::from_gateway_status(&payment.status),
            raw_status: payment.status,
            amount: payment.transaction_amount,
            payer_email: payment.payer.and_then(|p| p.email),
            correlation_token: payment
                .external_reference
                .filter(|reference| !reference.trim().is_empty()),
        })
    }
}
