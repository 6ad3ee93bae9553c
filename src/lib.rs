//! Storefront API Library
//!
//! Cart handling, checkout initiation against a hosted payment gateway,
//! webhook-driven payment reconciliation and the admin console.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod models;
pub mod openapi;
pub mod payments;
pub mod repositories;
pub mod services;
pub mod tracing;

use axum::{
    routing::{get, post, put},
    Router,
};
use http::HeaderValue;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::payments::PaymentGateway;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires repositories and services over an established pool.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config, gateway);
        Self {
            db,
            config,
            services,
        }
    }
}

pub fn api_routes() -> Router<AppState> {
    let storefront = Router::new()
        .route("/checkout/initiate", post(handlers::checkout::initiate_checkout))
        .route("/webhook/payment", post(handlers::payment_webhooks::payment_webhook))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/users/:user_id/orders", get(handlers::orders::list_user_orders))
        .route("/products/:id", get(handlers::admin::get_product));

    let carts = Router::new()
        .route("/carts/merge", post(handlers::carts::merge_carts))
        .route("/carts/:owner", get(handlers::carts::get_cart))
        .route("/carts/:owner/items", post(handlers::carts::add_item))
        .route(
            "/carts/:owner/items/:product_id",
            put(handlers::carts::set_item_quantity).delete(handlers::carts::remove_item),
        )
        .route("/carts/:owner/clear", post(handlers::carts::clear_cart));

    let admin = Router::new()
        .route("/orders", get(handlers::admin::list_orders))
        .route(
            "/orders/:id/fulfillment",
            put(handlers::admin::update_fulfillment),
        )
        .route("/orders/:id/cancel", post(handlers::admin::cancel_order))
        .route("/products/discount", post(handlers::admin::apply_discount))
        .route("/products/restore", post(handlers::admin::restore_prices))
        .route("/products/:id", put(handlers::admin::upsert_product))
        .route(
            "/products/:id/active",
            put(handlers::admin::set_product_active),
        );

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .merge(storefront)
        .merge(carts)
        .nest("/admin", admin)
}

/// CORS policy from config. `None` means the config allows no origin at all,
/// which is a startup error outside development.
pub fn cors_layer(cfg: &config::AppConfig) -> Option<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if cfg.should_allow_permissive_cors() {
        Some(CorsLayer::permissive())
    } else {
        None
    }
}

/// Full application: API routes, Swagger UI, tracing and request ids.
pub fn app_router(state: AppState, cors: CorsLayer) -> Router {
    Router::<AppState>::new()
        .merge(api_routes())
        .merge(openapi::swagger_ui())
        // HTTP tracing layer for consistent request/response telemetry
        .layer(crate::tracing::configure_http_tracing())
        .layer(cors)
        // Outermost, so every span and error body sees the id
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}
