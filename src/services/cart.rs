use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::errors::ServiceError;
use crate::models::{Cart, CartLine, CartOwner};
use crate::repositories::{CartStorage, ProductRepository};

/// Cart Store: device carts live in the local store until sign-in, user
/// carts in the remote store. Each mutation writes to exactly one of them.
#[derive(Clone)]
pub struct CartService {
    local: Arc<dyn CartStorage>,
    remote: Arc<dyn CartStorage>,
    products: Arc<ProductRepository>,
}

impl CartService {
    pub fn new(
        local: Arc<dyn CartStorage>,
        remote: Arc<dyn CartStorage>,
        products: Arc<ProductRepository>,
    ) -> Self {
        Self {
            local,
            remote,
            products,
        }
    }

    fn store_for(&self, owner: &CartOwner) -> &dyn CartStorage {
        if owner.is_user() {
            self.remote.as_ref()
        } else {
            self.local.as_ref()
        }
    }

    pub async fn get(&self, owner: &CartOwner) -> Result<Cart, ServiceError> {
        self.store_for(owner).load(owner.id()).await
    }

    /// Adds `quantity` of a catalog product, snapshotting its current price.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: &CartOwner,
        product_id: &str,
        quantity: u32,
    ) -> Result<Cart, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::ValidationError(
                "quantity must be at least 1".to_string(),
            ));
        }

        let product = self
            .products
            .get(product_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", product_id)))?;
        if !product.active {
            return Err(ServiceError::InvalidOperation(format!(
                "product {} is not available",
                product_id
            )));
        }

        let store = self.store_for(owner);
        let mut cart = store.load(owner.id()).await?;
        cart.add(CartLine {
            product_id: product.id,
            name: product.name,
            unit_price: product.price,
            quantity,
        });
        store.save(owner.id(), &cart).await?;
        Ok(cart)
    }

    pub async fn remove_item(
        &self,
        owner: &CartOwner,
        product_id: &str,
    ) -> Result<Cart, ServiceError> {
        let store = self.store_for(owner);
        let mut cart = store.load(owner.id()).await?;
        if cart.remove(product_id) {
            store.save(owner.id(), &cart).await?;
        }
        Ok(cart)
    }

    /// Quantities below 1 leave the cart untouched.
    pub async fn set_quantity(
        &self,
        owner: &CartOwner,
        product_id: &str,
        quantity: u32,
    ) -> Result<Cart, ServiceError> {
        let store = self.store_for(owner);
        let mut cart = store.load(owner.id()).await?;
        if cart.set_quantity(product_id, quantity) {
            store.save(owner.id(), &cart).await?;
        }
        Ok(cart)
    }

    /// Empties the cart once the client has seen a successful payment redirect.
    pub async fn clear(&self, owner: &CartOwner) -> Result<(), ServiceError> {
        self.store_for(owner).take(owner.id()).await.map(|_| ())
    }

    /// One-time sign-in merge: the device cart is taken out of the local
    /// store and folded into the user's remote cart.
    ///
    /// Taking first makes a repeated or concurrent call see an empty local
    /// cart and return the remote cart unchanged.
    #[instrument(skip(self))]
    pub async fn merge_on_login(
        &self,
        device_id: &str,
        user_id: &str,
    ) -> Result<Cart, ServiceError> {
        let local = self.local.take(device_id).await?;
        if local.is_empty() {
            return self.remote.load(user_id).await;
        }

        let lines = local.lines.len();
        match self.remote.merge_into(user_id, local.clone()).await {
            Ok(merged) => {
                info!(lines, merged_lines = merged.lines.len(), "device cart merged");
                Ok(merged)
            }
            Err(e) => {
                error!(error = %e, "cart merge failed; restoring device cart");
                if let Err(restore) = self.local.merge_into(device_id, local).await {
                    warn!(error = %restore, "could not restore device cart");
                }
                Err(e)
            }
        }
    }
}
