use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::entities::product::{
    ActiveModel as ProductActiveModel, Column, Entity as ProductEntity,
};
use crate::errors::ServiceError;
use crate::models::product::PriceChange;
use crate::models::Product;
use crate::repositories::Repository;

use super::BaseRepository;

#[derive(Debug)]
pub struct ProductRepository {
    base: BaseRepository,
}

impl ProductRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            base: BaseRepository::new(db),
        }
    }

    pub async fn get(&self, id: &str) -> Result<Option<Product>, ServiceError> {
        Ok(ProductEntity::find_by_id(id.to_string())
            .one(self.base.get_db())
            .await?
            .map(Product::from))
    }

    /// Inserts or replaces a catalog entry.
    pub async fn upsert(&self, product: &Product) -> Result<Product, ServiceError> {
        let db = self.base.get_db();
        let exists = ProductEntity::find_by_id(product.id.clone())
            .one(db)
            .await?
            .is_some();

        let model = ProductActiveModel {
            id: Set(product.id.clone()),
            name: Set(product.name.clone()),
            price: Set(product.price),
            original_price: Set(product.original_price),
            discount_percent: Set(product.discount_percent),
            active: Set(product.active),
            updated_at: Set(Utc::now()),
        };
        let saved = if exists {
            model.update(db).await?
        } else {
            model.insert(db).await?
        };
        Ok(saved.into())
    }

    pub async fn set_active(
        &self,
        id: &str,
        active: bool,
    ) -> Result<Option<Product>, ServiceError> {
        let db = self.base.get_db();
        let Some(existing) = ProductEntity::find_by_id(id.to_string()).one(db).await? else {
            return Ok(None);
        };
        let mut model: ProductActiveModel = existing.into();
        model.active = Set(active);
        model.updated_at = Set(Utc::now());
        Ok(Some(model.update(db).await?.into()))
    }

    /// Rewrites the price fields of every listed product inside one
    /// transaction. If any id is unknown nothing is written.
    #[instrument(skip(self, ids, reprice), fields(count = ids.len()))]
    pub async fn reprice_all<F>(
        &self,
        ids: &[String],
        reprice: F,
    ) -> Result<Vec<Product>, ServiceError>
    where
        F: Fn(&Product) -> PriceChange + Send + Sync,
    {
        let wanted: BTreeSet<&String> = ids.iter().collect();
        let txn = self.base.get_db().begin().await?;

        let found = ProductEntity::find()
            .filter(Column::Id.is_in(wanted.iter().map(|id| id.as_str())))
            .all(&txn)
            .await?;

        if found.len() != wanted.len() {
            let missing: Vec<&str> = wanted
                .iter()
                .filter(|id| found.iter().all(|m| m.id.as_str() != id.as_str()))
                .map(|id| id.as_str())
                .collect();
            warn!(?missing, "batch reprice aborted; unknown products");
            txn.rollback().await?;
            return Err(ServiceError::NotFound(format!(
                "products not found: {}",
                missing.join(", ")
            )));
        }

        let now = Utc::now();
        let mut updated = Vec::with_capacity(found.len());
        for model in found {
            let change = reprice(&Product::from(model.clone()));
            let mut active: ProductActiveModel = model.into();
            active.price = Set(change.price);
            active.original_price = Set(change.original_price);
            active.discount_percent = Set(change.discount_percent);
            active.updated_at = Set(now);
            updated.push(Product::from(active.update(&txn).await?));
        }

        txn.commit().await?;
        info!(count = updated.len(), "batch reprice committed");
        Ok(updated)
    }
}
