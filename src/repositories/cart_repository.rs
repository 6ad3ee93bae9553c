use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::entities::cart::{ActiveModel as CartActiveModel, Entity as CartEntity};
use crate::errors::ServiceError;
use crate::models::Cart;
use crate::repositories::Repository;

use super::BaseRepository;

/// Keyed cart persistence.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CartStorage: Send + Sync {
    /// Missing carts load as empty.
    async fn load(&self, owner_id: &str) -> Result<Cart, ServiceError>;

    async fn save(&self, owner_id: &str, cart: &Cart) -> Result<(), ServiceError>;

    /// Atomically removes and returns the stored cart.
    async fn take(&self, owner_id: &str) -> Result<Cart, ServiceError>;

    /// Folds `local` into the stored cart (stored cart is the base) and
    /// persists the result as one write.
    async fn merge_into(&self, owner_id: &str, local: Cart) -> Result<Cart, ServiceError>;
}

/// Pre-auth carts, held in process memory per device.
#[derive(Debug, Default)]
pub struct LocalCartStore {
    carts: DashMap<String, Cart>,
}

impl LocalCartStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CartStorage for LocalCartStore {
    async fn load(&self, owner_id: &str) -> Result<Cart, ServiceError> {
        Ok(self
            .carts
            .get(owner_id)
            .map(|c| c.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, owner_id: &str, cart: &Cart) -> Result<(), ServiceError> {
        if cart.is_empty() {
            self.carts.remove(owner_id);
        } else {
            self.carts.insert(owner_id.to_string(), cart.clone());
        }
        Ok(())
    }

    async fn take(&self, owner_id: &str) -> Result<Cart, ServiceError> {
        Ok(self
            .carts
            .remove(owner_id)
            .map(|(_, cart)| cart)
            .unwrap_or_default())
    }

    async fn merge_into(&self, owner_id: &str, local: Cart) -> Result<Cart, ServiceError> {
        let mut entry = self.carts.entry(owner_id.to_string()).or_default();
        entry.merge_from(local);
        Ok(entry.clone())
    }
}

/// Signed-in carts, persisted in the `carts` table.
#[derive(Debug)]
pub struct RemoteCartStore {
    base: BaseRepository,
}

impl RemoteCartStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }
}

async fn write_cart<C>(
    conn: &C,
    owner_id: &str,
    cart: &Cart,
    exists: bool,
) -> Result<(), ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    let model = CartActiveModel {
        owner_id: Set(owner_id.to_string()),
        items: Set(serde_json::to_value(&cart.lines)?),
        updated_at: Set(Utc::now()),
    };
    if exists {
        model.update(conn).await?;
    } else {
        model.insert(conn).await?;
    }
    Ok(())
}

#[async_trait]
impl CartStorage for RemoteCartStore {
    async fn load(&self, owner_id: &str) -> Result<Cart, ServiceError> {
        CartEntity::find_by_id(owner_id.to_string())
            .one(self.base.get_db())
            .await?
            .map(Cart::try_from)
            .transpose()
            .map(Option::unwrap_or_default)
    }

    async fn save(&self, owner_id: &str, cart: &Cart) -> Result<(), ServiceError> {
        let txn = self.base.get_db().begin().await?;
        let exists = CartEntity::find_by_id(owner_id.to_string())
            .one(&txn)
            .await?
            .is_some();
        write_cart(&txn, owner_id, cart, exists).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn take(&self, owner_id: &str) -> Result<Cart, ServiceError> {
        let txn = self.base.get_db().begin().await?;
        let cart = match CartEntity::find_by_id(owner_id.to_string())
            .one(&txn)
            .await?
        {
            Some(model) => {
                CartEntity::delete_by_id(owner_id.to_string())
                    .exec(&txn)
                    .await?;
                Cart::try_from(model)?
            }
            None => Cart::default(),
        };
        txn.commit().await?;
        Ok(cart)
    }

    #[instrument(skip(self, local), fields(owner_id = %owner_id, local_lines = local.lines.len()))]
    async fn merge_into(&self, owner_id: &str, local: Cart) -> Result<Cart, ServiceError> {
        let txn = self.base.get_db().begin().await?;
        let existing = CartEntity::find_by_id(owner_id.to_string())
            .one(&txn)
            .await?;
        let exists = existing.is_some();

        let mut merged = existing
            .map(Cart::try_from)
            .transpose()?
            .unwrap_or_default();
        merged.merge_from(local);

        write_cart(&txn, owner_id, &merged, exists).await?;
        txn.commit().await?;
        debug!(lines = merged.lines.len(), "merged cart persisted");
        Ok(merged)
    }
}
