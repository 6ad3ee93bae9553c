use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{FulfillmentStatus, OrderItem, OrderOrigin, OrderRecord, OrderStatus};

/// The `orders` table.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Owner of the order, or `guest`.
    pub user_id: String,

    /// Checkout snapshot, a JSON array of `OrderItem`.
    #[sea_orm(column_type = "Json")]
    pub items: Json,

    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub fulfillment_status: FulfillmentStatus,

    /// Gateway payment id; unique once set.
    #[sea_orm(nullable, unique)]
    pub payment_id: Option<String>,
    pub payer_email: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub origin: OrderOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for OrderRecord {
    type Error = ServiceError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let items: Vec<OrderItem> = serde_json::from_value(model.items)?;
        Ok(OrderRecord {
            id: model.id,
            user_id: model.user_id,
            items,
            total: model.total,
            currency: model.currency,
            status: model.status,
            fulfillment_status: model.fulfillment_status,
            payment_id: model.payment_id,
            payer_email: model.payer_email,
            paid_amount: model.paid_amount,
            origin: model.origin,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
