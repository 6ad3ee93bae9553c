use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;

/// User id recorded on orders placed without a signed-in identity.
pub const GUEST_USER: &str = "guest";

/// Highest unit price accepted from a client or the catalog editor.
pub const MAX_UNIT_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Highest quantity a single cart or order line may carry.
pub const MAX_LINE_QUANTITY: u32 = 10_000;

/// `0 <= price <= MAX_UNIT_PRICE`.
pub fn is_valid_unit_price(price: Decimal) -> bool {
    !(price.is_sign_negative() && !price.is_zero()) && price <= MAX_UNIT_PRICE
}

/// Payment lifecycle of an order. Every state except `Pending` is terminal.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// Maps a raw Mercado Pago payment status onto the order lifecycle.
    ///
    /// `in_process`, `authorized`, `in_mediation` and anything unknown stay
    /// `Pending` so a later notification can still settle the order.
    pub fn from_gateway_status(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "approved" => OrderStatus::Approved,
            "rejected" => OrderStatus::Rejected,
            "cancelled" | "refunded" | "charged_back" => OrderStatus::Cancelled,
            _ => OrderStatus::Pending,
        }
    }
}

/// Manual fulfillment tracking, independent of the payment status.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    #[sea_orm(string_value = "preparing")]
    Preparing,
    #[sea_orm(string_value = "in_transit")]
    InTransit,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Which path created the record.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderOrigin {
    #[sea_orm(string_value = "checkout")]
    Checkout,
    /// Lazily backfilled from a payment notification.
    #[sea_orm(string_value = "reconciler")]
    Reconciler,
}

/// Line snapshot taken at checkout time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub product_id: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
}

impl OrderItem {
    /// `None` when the product does not fit in a `Decimal`.
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Σ(unit price × quantity) over a snapshot, or `None` on overflow.
pub fn snapshot_total(items: &[OrderItem]) -> Option<Decimal> {
    items
        .iter()
        .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total()?))
}

/// One purchase attempt as stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OrderRecord {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub payment_id: Option<String>,
    pub payer_email: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub origin: OrderOrigin,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for the order store; timestamps are assigned on write.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub id: Uuid,
    pub user_id: String,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub payer_email: Option<String>,
    pub paid_amount: Option<Decimal>,
    pub origin: OrderOrigin,
}

impl NewOrder {
    /// Pending order created ahead of the gateway call.
    pub fn pending(
        id: Uuid,
        user_id: String,
        items: Vec<OrderItem>,
        currency: String,
    ) -> Result<Self, ServiceError> {
        let total = snapshot_total(&items).ok_or_else(|| {
            ServiceError::ValidationError("order total is out of range".to_string())
        })?;
        Ok(Self {
            id,
            user_id,
            items,
            total,
            currency,
            status: OrderStatus::Pending,
            payment_id: None,
            payer_email: None,
            paid_amount: None,
            origin: OrderOrigin::Checkout,
        })
    }
}

/// Partial update applied by the reconciler or the admin console.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderChanges {
    pub status: Option<OrderStatus>,
    pub payment_id: Option<String>,
    pub payer_email: Option<String>,
    pub paid_amount: Option<Decimal>,
}

/// Result of a conditional (pending-only) order update.
#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    /// The write happened; carries the stored record.
    Applied(OrderRecord),
    /// The record is terminal and was left untouched.
    Ignored(OrderRecord),
    NotFound,
}
