#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{self, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde_json::Value;
use storefront_api::{
    config::{AppConfig, GatewayConfig},
    db,
    models::{OrderStatus, Product},
    payments::{GatewayError, PaymentDetails, PaymentGateway, Preference, PreferenceRequest},
    AppState,
};
use tower::ServiceExt;

/// Scripted stand-in for the hosted payment gateway.
#[derive(Default)]
pub struct FakeGateway {
    payments: DashMap<String, PaymentDetails>,
    preferences: Mutex<Vec<PreferenceRequest>>,
    fail_preferences: AtomicBool,
    payment_lookups: AtomicUsize,
}

impl FakeGateway {
    /// Registers what `get_payment(id)` will report.
    pub fn script_payment(
        &self,
        id: &str,
        status: OrderStatus,
        amount: Option<Decimal>,
        correlation_token: Option<String>,
    ) {
        self.payments.insert(
            id.to_string(),
            PaymentDetails {
                id: id.to_string(),
                status,
                raw_status: status.to_string(),
                amount,
                payer_email: Some("buyer@example.com".to_string()),
                correlation_token,
            },
        );
    }

    pub fn fail_preferences(&self, fail: bool) {
        self.fail_preferences.store(fail, Ordering::SeqCst);
    }

    pub fn preferences(&self) -> Vec<PreferenceRequest> {
        self.preferences.lock().unwrap().clone()
    }

    pub fn payment_lookups(&self) -> usize {
        self.payment_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> Result<Preference, GatewayError> {
        if self.fail_preferences.load(Ordering::SeqCst) {
            return Err(GatewayError::Unavailable("502 Bad Gateway".to_string()));
        }
        self.preferences.lock().unwrap().push(request.clone());
        Ok(Preference {
            id: format!("pref-{}", request.correlation_token),
            redirect_url: format!(
                "https://gateway.test/checkout?pref_id=pref-{}",
                request.correlation_token
            ),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails, GatewayError> {
        self.payment_lookups.fetch_add(1, Ordering::SeqCst);
        self.payments
            .get(payment_id)
            .map(|p| p.value().clone())
            .ok_or_else(|| GatewayError::NotFound(payment_id.to_string()))
    }
}

/// Router over an in-memory SQLite database and a [`FakeGateway`].
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
}

pub fn test_config() -> AppConfig {
    let mut gateway = GatewayConfig::new("https://gateway.test", "TEST-access-token");
    gateway.notification_url = Some("https://api.shop.test/webhook/payment".to_string());
    gateway.timeout_secs = 2;

    AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
        "https://shop.test".to_string(),
        gateway,
    )
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let pool = db::connect_in_memory()
            .await
            .expect("failed to create test database");
        let gateway = Arc::new(FakeGateway::default());
        let state = AppState::new(Arc::new(pool), cfg, gateway.clone());
        let router = storefront_api::app_router(
            state.clone(),
            tower_http::cors::CorsLayer::permissive(),
        );
        Self {
            router,
            state,
            gateway,
        }
    }

    pub async fn seed_product(&self, id: &str, name: &str, price: Decimal) -> Product {
        self.state
            .services
            .products
            .upsert(&Product {
                id: id.to_string(),
                name: name.to_string(),
                price,
                original_price: None,
                discount_percent: None,
                active: true,
                updated_at: Utc::now(),
            })
            .await
            .expect("failed to seed product")
    }

    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };
        self.send(builder.body(body).expect("failed to build request"))
            .await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
