use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::errors::ServiceError;
use crate::models::{Cart, CartLine};

/// Remote cart document, one row per signed-in user.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub owner_id: String,
    #[sea_orm(column_type = "Json")]
    pub items: Json,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Cart {
    type Error = ServiceError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        let lines: Vec<CartLine> = serde_json::from_value(model.items)?;
        Ok(Cart::new(lines))
    }
}
