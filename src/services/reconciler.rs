use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{
    snapshot_total, NewOrder, OrderChanges, OrderItem, OrderOrigin, OrderRecord, UpdateOutcome,
    GUEST_USER,
};
use crate::payments::{PaymentDetails, PaymentGateway};
use crate::repositories::OrderRepository;

/// What a reconciliation did to the order store.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// No record existed; one was backfilled from the payment.
    Created(OrderRecord),
    /// A pending record took the payment's state.
    Updated(OrderRecord),
    /// The record was already terminal (duplicate or late delivery).
    Unchanged(OrderRecord),
}

impl ReconcileOutcome {
    pub fn record(&self) -> &OrderRecord {
        match self {
            ReconcileOutcome::Created(r)
            | ReconcileOutcome::Updated(r)
            | ReconcileOutcome::Unchanged(r) => r,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReconcileOutcome::Created(_) => "created",
            ReconcileOutcome::Updated(_) => "updated",
            ReconcileOutcome::Unchanged(_) => "unchanged",
        }
    }
}

/// Structured reference used by older checkouts instead of an order id.
#[derive(Debug, Clone, Deserialize)]
struct LegacyReference {
    #[serde(alias = "userId", alias = "user_id")]
    user: Option<String>,
    #[serde(default)]
    cart: Vec<LegacyLine>,
}

#[derive(Debug, Clone, Deserialize)]
struct LegacyLine {
    id: String,
    #[serde(alias = "title")]
    name: Option<String>,
    price: Decimal,
    quantity: u32,
}

#[derive(Debug, Clone)]
enum Correlation {
    Order(Uuid),
    Legacy(LegacyReference),
    Unknown,
}

impl Correlation {
    fn parse(token: Option<&str>) -> Self {
        let Some(token) = token.map(str::trim).filter(|t| !t.is_empty()) else {
            return Correlation::Unknown;
        };
        if let Ok(id) = Uuid::parse_str(token) {
            return Correlation::Order(id);
        }
        match serde_json::from_str::<LegacyReference>(token) {
            Ok(reference) => Correlation::Legacy(reference),
            Err(_) => Correlation::Unknown,
        }
    }
}

/// Deterministic order id for payments that carry no order id of their own.
pub fn backfill_order_id(payment_id: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_OID,
        format!("storefront:payment:{}", payment_id).as_bytes(),
    )
}

/// Payment Event Reconciler.
///
/// Re-fetches every payment from the gateway and folds it into the order
/// store. Safe under duplicate and out-of-order delivery: terminal records
/// are never rewritten and the store's conditional update settles races.
#[derive(Clone)]
pub struct PaymentReconciler {
    orders: Arc<OrderRepository>,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    gateway_timeout: Duration,
}

impl PaymentReconciler {
    pub fn new(
        orders: Arc<OrderRepository>,
        gateway: Arc<dyn PaymentGateway>,
        currency: String,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            orders,
            gateway,
            currency,
            gateway_timeout,
        }
    }

    #[instrument(skip(self))]
    pub async fn reconcile(&self, payment_id: &str) -> Result<ReconcileOutcome, ServiceError> {
        let details = tokio::time::timeout(self.gateway_timeout, self.gateway.get_payment(payment_id))
            .await
            .map_err(|_| {
                ServiceError::GatewayTimeout(format!("payment {} lookup timed out", payment_id))
            })??;

        info!(
            payment_id = %details.id,
            status = %details.status,
            raw_status = %details.raw_status,
            "payment fetched"
        );

        let correlation = Correlation::parse(details.correlation_token.as_deref());
        let target = self.resolve_target(&details, &correlation).await?;

        let existing = match self.orders.get_by_id(target).await? {
            Some(record) => record,
            None => match self.backfill(target, &details, correlation).await? {
                Backfill::Created(record) => return Ok(ReconcileOutcome::Created(record)),
                Backfill::Raced(record) => record,
            },
        };

        self.apply(existing, &details).await
    }

    async fn resolve_target(
        &self,
        details: &PaymentDetails,
        correlation: &Correlation,
    ) -> Result<Uuid, ServiceError> {
        if let Correlation::Order(id) = correlation {
            return Ok(*id);
        }
        if matches!(correlation, Correlation::Unknown) {
            warn!(payment_id = %details.id, "payment carries no usable correlation token");
        }
        Ok(match self.orders.get_by_payment_id(&details.id).await? {
            Some(record) => record.id,
            None => backfill_order_id(&details.id),
        })
    }

    async fn backfill(
        &self,
        id: Uuid,
        details: &PaymentDetails,
        correlation: Correlation,
    ) -> Result<Backfill, ServiceError> {
        let (user_id, items) = match correlation {
            Correlation::Legacy(reference) => {
                let user = reference
                    .user
                    .map(|u| u.trim().to_string())
                    .filter(|u| !u.is_empty())
                    .unwrap_or_else(|| GUEST_USER.to_string());
                let items = reference
                    .cart
                    .into_iter()
                    .map(|line| OrderItem {
                        name: line.name.unwrap_or_else(|| line.id.clone()),
                        product_id: line.id,
                        unit_price: line.price,
                        quantity: line.quantity,
                    })
                    .collect::<Vec<_>>();
                (user, items)
            }
            Correlation::Order(_) | Correlation::Unknown => (GUEST_USER.to_string(), Vec::new()),
        };

        let paid = details.amount.unwrap_or(Decimal::ZERO);
        let total = if items.is_empty() {
            paid
        } else {
            snapshot_total(&items).unwrap_or_else(|| {
                warn!(payment_id = %details.id, "legacy cart total is out of range; using paid amount");
                paid
            })
        };

        let order = NewOrder {
            id,
            user_id,
            items,
            total,
            currency: self.currency.clone(),
            status: details.status,
            payment_id: Some(details.id.clone()),
            payer_email: details.payer_email.clone(),
            paid_amount: details.amount,
            origin: OrderOrigin::Reconciler,
        };

        match self.orders.create(&order).await {
            Ok(record) => {
                info!(order_id = %record.id, payment_id = %details.id, "order backfilled from payment");
                self.check_amount(&record, details);
                Ok(Backfill::Created(record))
            }
            Err(ServiceError::Conflict(_)) => {
                // A concurrent delivery inserted first.
                let raced = match self.orders.get_by_id(id).await? {
                    Some(record) => Some(record),
                    None => self.orders.get_by_payment_id(&details.id).await?,
                };
                raced
                    .map(Backfill::Raced)
                    .ok_or(ServiceError::ConcurrentModification(id))
            }
            Err(e) => Err(e),
        }
    }

    async fn apply(
        &self,
        record: OrderRecord,
        details: &PaymentDetails,
    ) -> Result<ReconcileOutcome, ServiceError> {
        if record.status.is_terminal() {
            if record.payment_id.as_deref() != Some(details.id.as_str()) {
                warn!(
                    order_id = %record.id,
                    stored_payment = ?record.payment_id,
                    payment_id = %details.id,
                    "payment arrived for an order that is already settled"
                );
            }
            if record.status != details.status {
                info!(
                    order_id = %record.id,
                    stored = %record.status,
                    incoming = %details.status,
                    "terminal order left unchanged"
                );
            }
            return Ok(ReconcileOutcome::Unchanged(record));
        }

        let changes = OrderChanges {
            status: Some(details.status),
            payment_id: Some(details.id.clone()),
            payer_email: details.payer_email.clone(),
            paid_amount: details.amount,
        };

        match self.orders.update(record.id, changes).await? {
            UpdateOutcome::Applied(updated) => {
                info!(order_id = %updated.id, status = %updated.status, "order reconciled");
                self.check_amount(&updated, details);
                Ok(ReconcileOutcome::Updated(updated))
            }
            UpdateOutcome::Ignored(current) => Ok(ReconcileOutcome::Unchanged(current)),
            UpdateOutcome::NotFound => Err(ServiceError::ConcurrentModification(record.id)),
        }
    }

    fn check_amount(&self, record: &OrderRecord, details: &PaymentDetails) {
        if let Some(paid) = details.amount {
            if !record.items.is_empty() && paid != record.total {
                warn!(
                    order_id = %record.id,
                    total = %record.total,
                    paid = %paid,
                    "paid amount differs from order total"
                );
            }
        }
    }
}

enum Backfill {
    Created(OrderRecord),
    Raced(OrderRecord),
}
