//! Mercado Pago REST client against a mock HTTP server.

use rust_decimal_macros::dec;
use serde_json::json;
use storefront_api::config::GatewayConfig;
use storefront_api::models::OrderStatus;
use storefront_api::payments::{
    BackUrls, GatewayError, MercadoPagoClient, PaymentGateway, PreferenceItem, PreferenceRequest,
};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> MercadoPagoClient {
    let mut config = GatewayConfig::new(server.uri(), "TEST-token");
    config.timeout_secs = 1;
    MercadoPagoClient::new(&config).unwrap()
}

fn preference_request() -> PreferenceRequest {
    PreferenceRequest {
        items: vec![PreferenceItem {
            id: "p1".into(),
            title: "Mug".into(),
            unit_price: dec!(10),
            quantity: 3,
        }],
        currency: "ARS".into(),
        back_urls: BackUrls {
            success: "https://shop.test/checkout-success".into(),
            failure: "https://shop.test/checkout-failure".into(),
            pending: "https://shop.test/checkout-pending".into(),
        },
        notification_url: Some("https://api.shop.test/webhook/payment".into()),
        correlation_token: "0f8fad5b-d9cb-469f-a165-70867728950e".into(),
    }
}

#[tokio::test]
async fn creates_preference_with_external_reference() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/checkout/preferences"))
        .and(header("authorization", "Bearer TEST-token"))
        .and(body_partial_json(json!({
            "external_reference": "0f8fad5b-d9cb-469f-a165-70867728950e",
            "auto_return": "approved",
            "notification_url": "https://api.shop.test/webhook/payment",
            "back_urls": { "success": "https://shop.test/checkout-success" },
            "items": [{ "id": "p1", "title": "Mug", "quantity": 3, "unit_price": 10.0, "currency_id": "ARS" }]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "123-pref",
            "init_point": "https://www.mercadopago.test/checkout/v1/redirect?pref_id=123-pref"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let preference = client(&server)
        .create_preference(&preference_request())
        .await
        .unwrap();
    assert_eq!(preference.id, "123-pref");
    assert!(preference.redirect_url.ends_with("pref_id=123-pref"));
}

#[tokio::test]
async fn fetches_and_maps_payment_details() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/987654"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 987654,
            "status": "approved",
            "status_detail": "accredited",
            "external_reference": "0f8fad5b-d9cb-469f-a165-70867728950e",
            "transaction_amount": 30.0,
            "payer": { "email": "buyer@example.com" }
        })))
        .mount(&server)
        .await;

    let payment = client(&server).get_payment("987654").await.unwrap();
    assert_eq!(payment.id, "987654");
    assert_eq!(payment.status, OrderStatus::Approved);
    assert_eq!(payment.amount, Some(dec!(30)));
    assert_eq!(payment.payer_email.as_deref(), Some("buyer@example.com"));
    assert_eq!(
        payment.correlation_token.as_deref(),
        Some("0f8fad5b-d9cb-469f-a165-70867728950e")
    );
}

#[tokio::test]
async fn classifies_gateway_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "not found" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/busy"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/checkout/preferences"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "message": "invalid items" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/payments/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_secs(3))
                .set_body_json(json!({ "id": 1, "status": "approved" })),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    assert!(matches!(
        client.get_payment("missing").await,
        Err(GatewayError::NotFound(_))
    ));
    assert!(matches!(
        client.get_payment("busy").await,
        Err(GatewayError::Unavailable(_))
    ));
    assert!(matches!(
        client.create_preference(&preference_request()).await,
        Err(GatewayError::Rejected { status: 400, .. })
    ));
    assert!(matches!(
        client.get_payment("slow").await,
        Err(GatewayError::Timeout)
    ));
}

#[tokio::test]
async fn payment_id_cannot_escape_the_payments_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/users/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1, "status": "approved" })))
        .expect(0)
        .mount(&server)
        .await;

    let result = client(&server).get_payment("1/../../users/me").await;
    assert!(matches!(result, Err(GatewayError::NotFound(_))));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].url.path().starts_with("/v1/payments/"));
    assert_eq!(requests[0].url.path_segments().unwrap().count(), 3);
}
