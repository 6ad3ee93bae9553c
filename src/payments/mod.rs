//! Payment gateway boundary.
//!
//! Services talk to the provider only through [`PaymentGateway`]; the
//! production implementation is [`mercadopago::MercadoPagoClient`].

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::errors::ServiceError;
use crate::models::OrderStatus;

pub mod mercadopago;
pub mod webhook;

pub use mercadopago::MercadoPagoClient;

/// Return pages the hosted checkout redirects to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PreferenceItem {
    pub id: String,
    pub title: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Everything needed to mint one checkout preference.
#[derive(Clone, Debug, PartialEq)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub currency: String,
    pub back_urls: BackUrls,
    pub notification_url: Option<String>,
    /// Echoed back verbatim as the payment's external reference.
    pub correlation_token: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Preference {
    pub id: String,
    pub redirect_url: String,
}

/// Authoritative payment state as reported by the gateway.
#[derive(Clone, Debug, PartialEq)]
pub struct PaymentDetails {
    pub id: String,
    pub status: OrderStatus,
    /// Provider status before mapping, kept for logs.
    pub raw_status: String,
    pub amount: Option<Decimal>,
    pub payer_email: Option<String>,
    pub correlation_token: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("payment gateway timed out")]
    Timeout,

    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("payment gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("payment gateway has no record of {0}")]
    NotFound(String),

    #[error("malformed gateway response: {0}")]
    Malformed(String),
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout => ServiceError::GatewayTimeout(err.to_string()),
            GatewayError::NotFound(id) => ServiceError::NotFound(format!("payment {}", id)),
            other => ServiceError::ExternalServiceError(other.to_string()),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, GatewayError>;

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError>;
}

/// Identifiers the provider sends either as JSON numbers or strings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum LooseId {
    Number(u64),
    Text(String),
}

impl LooseId {
    pub(crate) fn into_string(self) -> String {
        match self {
            LooseId::Number(n) => n.to_string(),
            LooseId::Text(s) => s.trim().to_string(),
        }
    }
}
