use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;
use crate::models::{is_valid_unit_price, NewOrder, OrderItem, GUEST_USER};
use crate::payments::{BackUrls, PaymentGateway, PreferenceItem, PreferenceRequest};
use crate::repositories::OrderRepository;

fn validate_unit_price(price: &Decimal) -> Result<(), ValidationError> {
    if is_valid_unit_price(*price) {
        return Ok(());
    }
    let mut err = ValidationError::new("price");
    err.message = Some("price must be between 0 and 1000000000".into());
    Err(err)
}

/// One cart line as submitted by the storefront.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutItem {
    #[serde(alias = "id", alias = "productId")]
    #[validate(length(min = 1, message = "product id is required"))]
    pub product_id: String,
    #[validate(length(min = 1, message = "item name is required"))]
    pub name: String,
    #[validate(custom = "validate_unit_price")]
    pub price: Decimal,
    #[validate(range(min = 1, max = 10000, message = "quantity must be between 1 and 10000"))]
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "cart is empty"))]
    #[validate]
    pub items: Vec<CheckoutItem>,
    #[serde(default, alias = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CheckoutResponse {
    pub order_id: Uuid,
    pub redirect_url: String,
}

/// Static inputs to every checkout: where the gateway sends the buyer and
/// the webhook, and how long to wait for it.
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    pub currency: String,
    pub back_urls: BackUrls,
    pub notification_url: Option<String>,
    pub gateway_timeout: Duration,
    pub require_auth: bool,
}

/// Checkout Initiator.
#[derive(Clone)]
pub struct CheckoutService {
    orders: Arc<OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
    settings: CheckoutSettings,
}

impl CheckoutService {
    pub fn new(
        orders: Arc<OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            orders,
            gateway,
            settings,
        }
    }

    fn resolve_identity(&self, user_id: Option<&str>) -> Result<String, ServiceError> {
        match user_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => Ok(id.to_string()),
            None if self.settings.require_auth => Err(ServiceError::Unauthorized(
                "sign in to complete checkout".to_string(),
            )),
            None => Ok(GUEST_USER.to_string()),
        }
    }

    /// Records a pending order, then asks the gateway for a redirect.
    ///
    /// The order exists before the gateway is called. If the gateway call
    /// fails or times out the pending record is discarded and the caller
    /// gets `CheckoutUnavailable`.
    #[instrument(skip(self, request), fields(items = request.items.len()))]
    pub async fn initiate(&self, request: CheckoutRequest) -> Result<CheckoutResponse, ServiceError> {
        request.validate()?;
        let user_id = self.resolve_identity(request.user_id.as_deref())?;

        let items: Vec<OrderItem> = request
            .items
            .into_iter()
            .map(|item| OrderItem {
                product_id: item.product_id,
                name: item.name,
                unit_price: item.price,
                quantity: item.quantity,
            })
            .collect();

        let order = NewOrder::pending(
            Uuid::new_v4(),
            user_id,
            items,
            self.settings.currency.clone(),
        )?;
        let record = self.orders.create(&order).await?;
        info!(order_id = %record.id, total = %record.total, user_id = %record.user_id, "pending order recorded");

        let preference_request = PreferenceRequest {
            items: record
                .items
                .iter()
                .map(|item| PreferenceItem {
                    id: item.product_id.clone(),
                    title: item.name.clone(),
                    unit_price: item.unit_price,
                    quantity: item.quantity,
                })
                .collect(),
            currency: record.currency.clone(),
            back_urls: self.settings.back_urls.clone(),
            notification_url: self.settings.notification_url.clone(),
            correlation_token: record.id.to_string(),
        };

        let outcome = tokio::time::timeout(
            self.settings.gateway_timeout,
            self.gateway.create_preference(&preference_request),
        )
        .await;

        let cause = match outcome {
            Ok(Ok(preference)) => {
                counter!("storefront_checkout_total", 1, "result" => "ok");
                info!(order_id = %record.id, preference_id = %preference.id, "checkout preference created");
                return Ok(CheckoutResponse {
                    order_id: record.id,
                    redirect_url: preference.redirect_url,
                });
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => "payment gateway timed out".to_string(),
        };

        counter!("storefront_checkout_total", 1, "result" => "gateway_error");
        error!(order_id = %record.id, error = %cause, "checkout preference failed");

        match self.orders.discard_pending(record.id).await {
            Ok(true) => {}
            Ok(false) => warn!(order_id = %record.id, "pending order already touched; kept"),
            Err(e) => warn!(order_id = %record.id, error = %e, "could not discard pending order"),
        }

        Err(ServiceError::CheckoutUnavailable(cause))
    }
}
