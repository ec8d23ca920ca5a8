use actix_web::{
    body::MessageBody,
    http::{header::ContentType, StatusCode},
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use boutique_payment_engine::{
    db_types::{OrderStatusType, Role},
    traits::GatewayConfirmation,
    OrderFlowApi,
    PaymentGatewayError,
};
use bps_common::Secret;
use serde_json::{json, Value};
use upi_gateway::{
    helpers::{calculate_hmac_hex, sign_payment},
    GatewayApi,
    GatewayConfig,
};

use super::{
    helpers::{issue_token, order_fixture, post_request},
    mocks::MockBackend,
};
use crate::{
    gateway_routes::{GatewayWebhookRoute, VerifyGatewayPaymentRoute},
    middleware::HmacMiddlewareFactory,
};

// Test-only secrets. The sync and webhook secrets are deliberately different, as in production.
const SYNC_SECRET: &str = "sync_secret_for_tests";
const WEBHOOK_SECRET: &str = "webhook_secret_for_tests";

fn gateway_api() -> GatewayApi {
    let config = GatewayConfig {
        base_url: "https://api.gateway.example".into(),
        key_id: "key_test_1".into(),
        api_secret: Secret::new(SYNC_SECRET.to_string()),
        webhook_secret: Secret::new(WEBHOOK_SECRET.to_string()),
    };
    GatewayApi::new(config).expect("Could not build the gateway client")
}

//----------------------------------------   Synchronous verify   ----------------------------------------------

#[actix_web::test]
async fn sync_verify_rejects_forged_signatures() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    // Signed for pay_43, presented for pay_42: the tamper must be caught and nothing may be mutated. The mock
    // carries no expectations, so any backend call would fail the test.
    let signature = sign_payment(SYNC_SECRET, "intent_1", "pay_43");
    let (status, body) = post_request(
        &token,
        "/gateway/verify",
        json!({"intentId": "intent_1", "paymentId": "pay_42", "signature": signature}),
        configure_verify(MockBackend::new()),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Invalid payment signature"), "was: {body}");
}

#[actix_web::test]
async fn sync_verify_applies_valid_confirmations() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    let signature = sign_payment(SYNC_SECRET, "intent_1", "pay_42");
    let mut backend = MockBackend::new();
    backend
        .expect_confirm_gateway_payment()
        .withf(|intent, payment, fallback| intent == "intent_1" && payment == "pay_42" && fallback.is_none())
        .returning(|intent, payment, _| {
            let mut order = order_fixture(1, 1, None);
            order.status = OrderStatusType::PaymentVerified;
            order.payment_verified = true;
            order.gateway_intent_id = Some(intent.to_string());
            order.payment_id = Some(payment.to_string());
            Ok(GatewayConfirmation::Applied { order: Some(order), membership: None })
        });
    let (status, body) = post_request(
        &token,
        "/gateway/verify",
        json!({"intentId": "intent_1", "paymentId": "pay_42", "signature": signature}),
        configure_verify(backend),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["alreadyProcessed"], json!(false));
    assert_eq!(body["paymentId"], json!("pay_42"));
}

#[actix_web::test]
async fn duplicate_sync_verify_is_an_idempotent_no_op() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    let signature = sign_payment(SYNC_SECRET, "intent_1", "pay_42");
    let mut backend = MockBackend::new();
    backend.expect_confirm_gateway_payment().returning(|_, _, _| Ok(GatewayConfirmation::AlreadyProcessed));
    let (status, body) = post_request(
        &token,
        "/gateway/verify",
        json!({"intentId": "intent_1", "paymentId": "pay_42", "signature": signature}),
        configure_verify(backend),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["alreadyProcessed"], json!(true));
}

fn configure_verify(backend: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.service(VerifyGatewayPaymentRoute::<MockBackend>::new())
            .app_data(web::Data::new(OrderFlowApi::new(backend)))
            .app_data(web::Data::new(gateway_api()));
    }
}

//----------------------------------------        Webhook        -----------------------------------------------

#[actix_web::test]
async fn webhook_without_a_signature_is_refused() {
    let _ = env_logger::try_init().ok();
    let body = captured_event("intent_1", "pay_42").to_string();
    let err = webhook_request(body, None, MockBackend::new()).await.expect_err("Expected error");
    assert_eq!(err, "No HMAC signature found.");
}

#[actix_web::test]
async fn webhook_with_a_tampered_body_is_refused() {
    let _ = env_logger::try_init().ok();
    let body = captured_event("intent_1", "pay_42").to_string();
    let signature = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let tampered = captured_event("intent_1", "pay_43").to_string();
    let err = webhook_request(tampered, Some(&signature), MockBackend::new()).await.expect_err("Expected error");
    assert_eq!(err, "Invalid HMAC signature.");
}

#[actix_web::test]
async fn webhook_applies_a_signed_confirmation() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_confirm_gateway_payment()
        .withf(|intent, payment, fallback| intent == "intent_1" && payment == "pay_42" && fallback.is_none())
        .returning(|_, _, _| {
            let mut order = order_fixture(1, 1, None);
            order.status = OrderStatusType::PaymentVerified;
            order.payment_verified = true;
            Ok(GatewayConfirmation::Applied { order: Some(order), membership: None })
        });
    let body = captured_event("intent_1", "pay_42").to_string();
    let signature = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, body) = webhook_request(body, Some(&signature), backend).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(true));
}

#[actix_web::test]
async fn webhook_redelivery_is_acknowledged_without_side_effects() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_confirm_gateway_payment().returning(|_, _, _| Ok(GatewayConfirmation::AlreadyProcessed));
    let body = captured_event("intent_1", "pay_42").to_string();
    let signature = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, body) = webhook_request(body, Some(&signature), backend).await.unwrap();
    // A 2xx even for duplicates, or the gateway keeps retrying forever.
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(true));
    assert!(body["message"].as_str().unwrap().contains("already applied"), "was: {body}");
}

#[actix_web::test]
async fn webhook_acknowledges_out_of_stock_as_a_business_failure() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_confirm_gateway_payment().returning(|_, _, _| {
        Err(PaymentGatewayError::OutOfStock { product_id: 1, requested: 2, available: 0 })
    });
    let body = captured_event("intent_1", "pay_42").to_string();
    let signature = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, body) = webhook_request(body, Some(&signature), backend).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(false));
}

#[actix_web::test]
async fn webhook_records_payment_failures() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_mark_intent_failed()
        .withf(|intent| intent == "intent_1")
        .returning(|_| Ok(()));
    let body = json!({
        "event": "payment.failed",
        "payload": {"payment": {"entity": {"id": "pay_42", "order_id": "intent_1", "status": "failed"}}}
    })
    .to_string();
    let signature = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, body) = webhook_request(body, Some(&signature), backend).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(true));
}

#[actix_web::test]
async fn webhook_ignores_unrelated_events() {
    let _ = env_logger::try_init().ok();
    let body = json!({"event": "refund.created", "payload": {}}).to_string();
    let signature = calculate_hmac_hex(WEBHOOK_SECRET, body.as_bytes());
    let (status, body) = webhook_request(body, Some(&signature), MockBackend::new()).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["success"], json!(true));
}

fn captured_event(intent_id: &str, payment_id: &str) -> Value {
    json!({
        "event": "payment.captured",
        "payload": {"payment": {"entity": {"id": payment_id, "order_id": intent_id, "status": "captured"}}}
    })
}

/// Fires a webhook delivery at an app wrapped in the HMAC middleware, exactly like the production `/webhook`
/// scope. Signature rejections come back as `Err(message)`.
async fn webhook_request(
    body: String,
    signature: Option<&str>,
    backend: MockBackend,
) -> Result<(StatusCode, String), String> {
    let mut req = TestRequest::post().uri("/gateway").insert_header(ContentType::json()).set_payload(body);
    if let Some(signature) = signature {
        req = req.insert_header(("x-gateway-signature", signature));
    }
    let app = App::new()
        .wrap(HmacMiddlewareFactory::new("x-gateway-signature", Secret::new(WEBHOOK_SECRET.to_string()), true))
        .configure(move |cfg| {
            cfg.service(GatewayWebhookRoute::<MockBackend>::new())
                .app_data(web::Data::new(OrderFlowApi::new(backend)));
        });
    let service = test::init_service(app).await;
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
