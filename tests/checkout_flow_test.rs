//! Integration tests for checkout initiation and the webhook that settles it.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::models::OrderStatus;
use uuid::Uuid;

fn mug_cart(user: Option<&str>) -> serde_json::Value {
    json!({
        "items": [{ "productId": "p1", "name": "Mug", "price": 10, "quantity": 3 }],
        "userId": user,
    })
}

#[tokio::test]
async fn checkout_then_approved_webhook_settles_the_same_order() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/checkout/initiate", Some(mug_cart(Some("u1"))))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    let order_id: Uuid = body["order_id"].as_str().unwrap().parse().unwrap();
    assert!(body["redirect_url"]
        .as_str()
        .unwrap()
        .starts_with("https://gateway.test/checkout"));

    let pending = app
        .state
        .services
        .orders
        .get_by_id(order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.status, OrderStatus::Pending);
    assert_eq!(pending.total, dec!(30));

    let preferences = app.gateway.preferences();
    assert_eq!(preferences.len(), 1);
    assert_eq!(preferences[0].correlation_token, order_id.to_string());
    assert_eq!(
        preferences[0].back_urls.success,
        "https://shop.test/checkout-success"
    );

    app.gateway.script_payment(
        "123456",
        OrderStatus::Approved,
        Some(dec!(30)),
        Some(order_id.to_string()),
    );
    let webhook = app
        .request(
            Method::POST,
            "/webhook/payment",
            Some(json!({ "type": "payment", "data": { "id": "123456" } })),
        )
        .await;
    assert_eq!(webhook.status(), StatusCode::OK);

    let settled = app
        .state
        .services
        .orders
        .get_by_id(order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.status, OrderStatus::Approved);
    assert_eq!(settled.payment_id.as_deref(), Some("123456"));
    assert_eq!(settled.total, dec!(30));
    assert_eq!(app.state.services.orders.list(None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn order_keeps_its_price_snapshot() {
    let app = TestApp::new().await;
    app.seed_product("p1", "Mug", dec!(100)).await;

    let response = app
        .request(
            Method::POST,
            "/checkout/initiate",
            Some(json!({
                "items": [{ "id": "p1", "name": "Mug", "price": 100, "quantity": 2 }],
                "userId": "u1"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let order_id: Uuid = response_json(response).await["order_id"]
        .as_str()
        .unwrap()
        .parse()
        .unwrap();

    app.seed_product("p1", "Mug", dec!(150)).await;

    let order = app
        .request(Method::GET, &format!("/orders/{}", order_id), None)
        .await;
    assert_eq!(order.status(), StatusCode::OK);
    let order = response_json(order).await;
    let stored = app
        .state
        .services
        .orders
        .get_by_id(order_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.items[0].unit_price, dec!(100));
    assert_eq!(stored.total, dec!(200));
    assert_eq!(order["items"][0]["product_id"], "p1");
}

#[tokio::test]
async fn empty_cart_is_rejected_without_side_effects() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/checkout/initiate",
            Some(json!({ "items": [], "userId": "u1" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert!(body["request_id"].is_string());

    assert!(app.gateway.preferences().is_empty());
    assert!(app.state.services.orders.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn out_of_range_prices_are_a_client_error() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/checkout/initiate",
            Some(json!({
                "items": [{
                    "productId": "p1",
                    "name": "Mug",
                    "price": "79228162514264337593543950335",
                    "quantity": 2
                }],
                "userId": "u1"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.gateway.preferences().is_empty());
    assert!(app.state.services.orders.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn gateway_failure_fails_closed() {
    let app = TestApp::new().await;
    app.gateway.fail_preferences(true);

    let response = app
        .request(Method::POST, "/checkout/initiate", Some(mug_cart(Some("u1"))))
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["message"], "Could not start payment");
    assert!(!body["message"].as_str().unwrap().contains("502"));

    assert!(app.state.services.orders.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn guest_checkout_requires_sign_in_when_configured() {
    let mut cfg = common::test_config();
    cfg.require_auth_for_checkout = true;
    let app = TestApp::with_config(cfg).await;

    let response = app
        .request(Method::POST, "/checkout/initiate", Some(mug_cart(None)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(app.state.services.orders.list(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn order_history_is_newest_first() {
    let app = TestApp::new().await;
    let mut ids = Vec::new();
    for _ in 0..2 {
        let response = app
            .request(Method::POST, "/checkout/initiate", Some(mug_cart(Some("u9"))))
            .await;
        ids.push(response_json(response).await["order_id"].clone());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let history = response_json(app.request(Method::GET, "/users/u9/orders", None).await).await;
    let listed: Vec<_> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|o| o["id"].clone())
        .collect();
    assert_eq!(listed, vec![ids[1].clone(), ids[0].clone()]);

    let missing = app
        .request(Method::GET, &format!("/orders/{}", Uuid::new_v4()), None)
        .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
