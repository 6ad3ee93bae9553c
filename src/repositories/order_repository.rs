use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::entities::order::{ActiveModel as OrderActiveModel, Column, Entity as Order};
use crate::errors::ServiceError;
use crate::models::{
    FulfillmentStatus, NewOrder, OrderChanges, OrderRecord, OrderStatus, UpdateOutcome,
};
use crate::repositories::Repository;

use super::BaseRepository;

/// Order Record Store backed by the `orders` table.
///
/// The terminal-status invariant lives here as well as in the reconciler:
/// [`OrderRepository::update`] only ever writes rows that are still pending.
#[derive(Debug)]
pub struct OrderRepository {
    base: BaseRepository,
}

impl OrderRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    /// Inserts a new record. A duplicate id or payment id yields `Conflict`.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn create(&self, order: &NewOrder) -> Result<OrderRecord, ServiceError> {
        let now = Utc::now();
        let items = serde_json::to_value(&order.items)?;

        let model = OrderActiveModel {
            id: Set(order.id),
            user_id: Set(order.user_id.clone()),
            items: Set(items),
            total: Set(order.total),
            currency: Set(order.currency.clone()),
            status: Set(order.status),
            fulfillment_status: Set(FulfillmentStatus::default()),
            payment_id: Set(order.payment_id.clone()),
            payer_email: Set(order.payer_email.clone()),
            paid_amount: Set(order.paid_amount),
            origin: Set(order.origin),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let inserted = model
            .insert(self.base.get_db())
            .await
            .map_err(ServiceError::from_db)?;
        OrderRecord::try_from(inserted)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<OrderRecord>, ServiceError> {
        Order::find_by_id(id)
            .one(self.base.get_db())
            .await?
            .map(OrderRecord::try_from)
            .transpose()
    }

    pub async fn get_by_payment_id(
        &self,
        payment_id: &str,
    ) -> Result<Option<OrderRecord>, ServiceError> {
        Order::find()
            .filter(Column::PaymentId.eq(payment_id))
            .one(self.base.get_db())
            .await?
            .map(OrderRecord::try_from)
            .transpose()
    }

    /// Applies `changes` only while the stored record is `pending`.
    ///
    /// The check and the write are a single `UPDATE … WHERE status = 'pending'`,
    /// so concurrent deliveries cannot both move the record.
    #[instrument(skip(self, changes), fields(order_id = %id))]
    pub async fn update(
        &self,
        id: Uuid,
        changes: OrderChanges,
    ) -> Result<UpdateOutcome, ServiceError> {
        let db = self.base.get_db();

        let mut patch = OrderActiveModel {
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Some(status) = changes.status {
            patch.status = Set(status);
        }
        if let Some(payment_id) = changes.payment_id {
            patch.payment_id = Set(Some(payment_id));
        }
        if let Some(email) = changes.payer_email {
            patch.payer_email = Set(Some(email));
        }
        if let Some(amount) = changes.paid_amount {
            patch.paid_amount = Set(Some(amount));
        }

        let result = Order::update_many()
            .set(patch)
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(OrderStatus::Pending))
            .exec(db)
            .await
            .map_err(ServiceError::from_db)?;

        match self.get_by_id(id).await? {
            None => Ok(UpdateOutcome::NotFound),
            Some(record) if result.rows_affected > 0 => Ok(UpdateOutcome::Applied(record)),
            Some(record) => {
                info!(
                    order_id = %id,
                    status = %record.status,
                    "ignored update on terminal order"
                );
                Ok(UpdateOutcome::Ignored(record))
            }
        }
    }

    /// Fulfillment tracking is independent of the payment status.
    pub async fn set_fulfillment(
        &self,
        id: Uuid,
        fulfillment: FulfillmentStatus,
    ) -> Result<Option<OrderRecord>, ServiceError> {
        let db = self.base.get_db();
        let Some(existing) = Order::find_by_id(id).one(db).await? else {
            return Ok(None);
        };

        let mut active: OrderActiveModel = existing.into();
        active.fulfillment_status = Set(fulfillment);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await?;
        OrderRecord::try_from(updated).map(Some)
    }

    /// Newest first.
    pub async fn list_by_user(&self, user_id: &str) -> Result<Vec<OrderRecord>, ServiceError> {
        Order::find()
            .filter(Column::UserId.eq(user_id))
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await?
            .into_iter()
            .map(OrderRecord::try_from)
            .collect()
    }

    /// Newest first, optionally restricted to one payment status.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
    ) -> Result<Vec<OrderRecord>, ServiceError> {
        let mut query = Order::find();
        if let Some(status) = status {
            query = query.filter(Column::Status.eq(status));
        }
        query
            .order_by_desc(Column::CreatedAt)
            .all(self.base.get_db())
            .await?
            .into_iter()
            .map(OrderRecord::try_from)
            .collect()
    }

    /// Removes a checkout record that never reached the gateway.
    ///
    /// Only pending rows without a payment id are eligible; anything the
    /// reconciler has touched stays.
    pub async fn discard_pending(&self, id: Uuid) -> Result<bool, ServiceError> {
        let result = Order::delete_many()
            .filter(Column::Id.eq(id))
            .filter(Column::Status.eq(OrderStatus::Pending))
            .filter(Column::PaymentId.is_null())
            .exec(self.base.get_db())
            .await?;
        debug!(order_id = %id, removed = result.rows_affected, "discarded pending order");
        Ok(result.rows_affected > 0)
    }
}
