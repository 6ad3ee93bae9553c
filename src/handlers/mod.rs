pub mod admin;
pub mod carts;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod payment_webhooks;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::payments::PaymentGateway;
use crate::repositories::{LocalCartStore, OrderRepository, ProductRepository, RemoteCartStore};
use crate::services::{
    AdminService, CartService, CheckoutService, CheckoutSettings, PaymentReconciler,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub admin: Arc<AdminService>,
    pub orders: Arc<OrderRepository>,
    pub products: Arc<ProductRepository>,
}

impl AppServices {
    /// Wires every service over one pool and one gateway client.
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig, gateway: Arc<dyn PaymentGateway>) -> Self {
        let orders = Arc::new(OrderRepository::new(db_pool.clone()));
        let products = Arc::new(ProductRepository::new(db_pool.clone()));

        let cart = Arc::new(CartService::new(
            Arc::new(LocalCartStore::new()),
            Arc::new(RemoteCartStore::new(db_pool)),
            products.clone(),
        ));

        let checkout = Arc::new(CheckoutService::new(
            orders.clone(),
            gateway.clone(),
            CheckoutSettings {
                currency: config.gateway.currency.clone(),
                back_urls: config.back_urls(),
                notification_url: config.gateway.notification_url.clone(),
                gateway_timeout: config.gateway.timeout(),
                require_auth: config.require_auth_for_checkout,
            },
        ));

        let reconciler = Arc::new(PaymentReconciler::new(
            orders.clone(),
            gateway,
            config.gateway.currency.clone(),
            config.gateway.timeout(),
        ));

        let admin = Arc::new(AdminService::new(orders.clone(), products.clone()));

        Self {
            cart,
            checkout,
            reconciler,
            admin,
            orders,
            products,
        }
    }
}
