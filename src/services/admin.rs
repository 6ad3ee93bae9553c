use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::errors::ServiceError;
use crate::models::{
    is_valid_discount, is_valid_unit_price, FulfillmentStatus, OrderChanges, OrderRecord, OrderStatus, Product,
    UpdateOutcome,
};
use crate::repositories::{OrderRepository, ProductRepository};

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if is_valid_unit_price(*price) {
        Ok(())
    } else {
        Err(ValidationError::new("price_out_of_range"))
    }
}

fn validate_percent(percent: &Decimal) -> Result<(), ValidationError> {
    if is_valid_discount(*percent) {
        Ok(())
    } else {
        let mut err = ValidationError::new("percent");
        err.message = Some("discount must be at least 0 and below 100".into());
        Err(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DiscountRequest {
    #[validate(length(min = 1, message = "at least one product is required"))]
    pub product_ids: Vec<String>,
    #[validate(custom = "validate_percent")]
    pub percent: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct RestoreRequest {
    #[validate(length(min = 1, message = "at least one product is required"))]
    pub product_ids: Vec<String>,
}

/// Catalog entry as edited from the console. Setting a price clears any
/// running discount.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(custom = "validate_price")]
    pub price: Decimal,
    #[serde(default)]
    pub active: Option<bool>,
}

/// Back-office operations: order oversight and catalog pricing.
#[derive(Clone)]
pub struct AdminService {
    orders: Arc<OrderRepository>,
    products: Arc<ProductRepository>,
}

impl AdminService {
    pub fn new(orders: Arc<OrderRepository>, products: Arc<ProductRepository>) -> Self {
        Self { orders, products }
    }

    pub async fn list_orders(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>, ServiceError> {
        self.orders.list(status).await
    }

    #[instrument(skip(self))]
    pub async fn update_fulfillment(
        &self,
        id: Uuid,
        fulfillment: FulfillmentStatus,
    ) -> Result<OrderRecord, ServiceError> {
        self.orders
            .set_fulfillment(id, fulfillment)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", id)))
    }

    /// Moves a still-pending order to `cancelled`.
    #[instrument(skip(self))]
    pub async fn cancel_order(&self, id: Uuid) -> Result<OrderRecord, ServiceError> {
        let changes = OrderChanges {
            status: Some(OrderStatus::Cancelled),
            ..Default::default()
        };
        match self.orders.update(id, changes).await? {
            UpdateOutcome::Applied(record) => {
                info!(order_id = %id, "order cancelled by admin");
                Ok(record)
            }
            UpdateOutcome::Ignored(record) => Err(ServiceError::Conflict(format!(
                "order {} is already {}",
                id, record.status
            ))),
            UpdateOutcome::NotFound => Err(ServiceError::NotFound(format!("order {}", id))),
        }
    }

    /// All listed products get the discount, or none do.
    #[instrument(skip(self, request), fields(count = request.product_ids.len(), percent = %request.percent))]
    pub async fn apply_discount_to_set(
        &self,
        request: &DiscountRequest,
    ) -> Result<Vec<Product>, ServiceError> {
        request.validate()?;
        let percent = request.percent;
        self.products
            .reprice_all(&request.product_ids, |product| product.with_discount(percent))
            .await
    }

    #[instrument(skip(self, request), fields(count = request.product_ids.len()))]
    pub async fn restore_prices(
        &self,
        request: &RestoreRequest,
    ) -> Result<Vec<Product>, ServiceError> {
        request.validate()?;
        self.products
            .reprice_all(&request.product_ids, Product::restored)
            .await
    }

    pub async fn set_product_active(&self, id: &str, active: bool) -> Result<Product, ServiceError> {
        self.products
            .set_active(id, active)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))
    }

    pub async fn upsert_product(
        &self,
        id: &str,
        input: ProductInput,
    ) -> Result<Product, ServiceError> {
        input.validate()?;
        let existing = self.products.get(id).await?;
        let active = input
            .active
            .or(existing.as_ref().map(|p| p.active))
            .unwrap_or(true);

        self.products
            .upsert(&Product {
                id: id.to_string(),
                name: input.name,
                price: input.price,
                original_price: None,
                discount_percent: None,
                active,
                updated_at: Utc::now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_in_memory;
    use crate::models::{NewOrder, OrderItem};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    async fn service() -> (AdminService, Arc<OrderRepository>) {
        let db = Arc::new(connect_in_memory().await.unwrap());
        let orders = Arc::new(OrderRepository::new(db.clone()));
        let products = Arc::new(ProductRepository::new(db));
        (AdminService::new(orders.clone(), products), orders)
    }

    async fn seed_order(orders: &OrderRepository) -> Uuid {
        let order = NewOrder::pending(
            Uuid::new_v4(),
            "u1".into(),
            vec![OrderItem {
                product_id: "p1".into(),
                name: "Mug".into(),
                unit_price: dec!(10),
                quantity: 1,
            }],
            "ARS".into(),
        )
        .unwrap();
        orders.create(&order).await.unwrap().id
    }

    #[tokio::test]
    async fn cancel_only_applies_to_pending_orders() {
        let (admin, orders) = service().await;
        let id = seed_order(&orders).await;

        let cancelled = admin.cancel_order(id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        assert_matches!(admin.cancel_order(id).await, Err(ServiceError::Conflict(_)));
        assert_matches!(
            admin.cancel_order(Uuid::new_v4()).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn fulfillment_does_not_touch_payment_status() {
        let (admin, orders) = service().await;
        let id = seed_order(&orders).await;

        let shipped = admin
            .update_fulfillment(id, FulfillmentStatus::InTransit)
            .await
            .unwrap();
        assert_eq!(shipped.fulfillment_status, FulfillmentStatus::InTransit);
        assert_eq!(shipped.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn discount_then_restore() {
        let (admin, _) = service().await;
        for id in ["p1", "p2"] {
            admin
                .upsert_product(
                    id,
                    ProductInput {
                        name: id.to_uppercase(),
                        price: dec!(100),
                        active: None,
                    },
                )
                .await
                .unwrap();
        }
        let ids = vec!["p1".to_string(), "p2".to_string()];

        let discounted = admin
            .apply_discount_to_set(&DiscountRequest {
                product_ids: ids.clone(),
                percent: dec!(20),
            })
            .await
            .unwrap();
        assert!(discounted.iter().all(|p| p.price == dec!(80)));

        let restored = admin
            .restore_prices(&RestoreRequest { product_ids: ids })
            .await
            .unwrap();
        assert!(restored
            .iter()
            .all(|p| p.price == dec!(100) && p.original_price.is_none()));
    }

    #[tokio::test]
    async fn invalid_discounts_are_rejected_before_writing() {
        let (admin, _) = service().await;
        assert_matches!(
            admin
                .apply_discount_to_set(&DiscountRequest {
                    product_ids: vec!["p1".into()],
                    percent: dec!(100),
                })
                .await,
            Err(ServiceError::ValidationError(_))
        );
        assert_matches!(
            admin
                .apply_discount_to_set(&DiscountRequest {
                    product_ids: vec![],
                    percent: dec!(10),
                })
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn upsert_keeps_activation_unless_given() {
        let (admin, _) = service().await;
        admin.upsert_product("p1", ProductInput { name: "Mug".into(), price: dec!(5), active: None }).await.unwrap();
        admin.set_product_active("p1", false).await.unwrap();

        let renamed = admin
            .upsert_product("p1", ProductInput { name: "Big mug".into(), price: dec!(6), active: None })
            .await
            .unwrap();
        assert!(!renamed.active);
        assert_eq!(renamed.name, "Big mug");

        assert_matches!(
            admin.set_product_active("ghost", true).await,
            Err(ServiceError::NotFound(_))
        );
    }
}
