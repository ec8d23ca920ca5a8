use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web::ServiceConfig, App};
use boutique_payment_engine::db_types::{
    Order,
    OrderItem,
    OrderNumber,
    OrderStatusType,
    PaymentMethod,
    Role,
    ShippingAddress,
};
use bps_common::{Paise, Secret};
use chrono::{TimeZone, Utc};
use log::debug;

use crate::{auth::TokenIssuer, config::AuthConfig, middleware::JwtMiddlewareFactory};

// Creates a test `AuthConfig` for issuing tokens. DO NOT re-use this secret anywhere.
pub fn get_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("unit-test-secret-unit-test-secret-42".to_string()) }
}

pub fn issue_token(sub: i64, name: &str, roles: Vec<Role>, agent_id: Option<i64>) -> String {
    TokenIssuer::new(&get_auth_config()).issue_token(sub, name, roles, agent_id, None).expect("Failed to sign token")
}

/// Fires a GET at an app assembled from `configure`, wrapped in the JWT middleware exactly like the production
/// `/api` scope. Middleware rejections come back as `Err(message)`; handler responses as `Ok((status, body))`.
pub async fn get_request<F>(token: &str, path: &str, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    let mut req = TestRequest::get().uri(path);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    send_request(req, configure).await
}

pub async fn post_request<F>(
    token: &str,
    path: &str,
    body: serde_json::Value,
    configure: F,
) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
{
    let mut req = TestRequest::post().uri(path).set_json(&body);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    send_request(req, configure).await
}

pub async fn put_request<F>(
    token: &str,
    path: &str,
    body: serde_json::Value,
    configure: F,
) -> Result<(StatusCode, String), String>
where
    F: FnOnce(&mut ServiceConfig),
{
    let mut req = TestRequest::put().uri(path).set_json(&body);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    send_request(req, configure).await
}

async fn send_request<F>(req: TestRequest, configure: F) -> Result<(StatusCode, String), String>
where F: FnOnce(&mut ServiceConfig) {
    let app = App::new().wrap(JwtMiddlewareFactory::new(get_auth_config())).configure(configure);
    let service = test::init_service(app).await;
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req.to_request()).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}

/// A ledger entry as the engine would return it, with fixed timestamps so assertions stay deterministic.
pub fn order_fixture(id: i64, user_id: i64, coupon: Option<&str>) -> Order {
    let created = Utc.with_ymd_and_hms(2025, 2, 28, 13, 30, 0).unwrap();
    Order {
        id,
        order_number: OrderNumber(format!("ORD-10000{id}-TESTX")),
        user_id,
        items: vec![OrderItem {
            product_id: 1,
            name: "No. 5 Eau de Parfum".into(),
            brand: "Chanel".into(),
            price: Paise::from(1000),
            quantity: 2,
            image: String::new(),
            is_premium: false,
        }],
        subtotal: Paise::from(2000),
        shipping: Paise::from(100),
        tax: Paise::from(180),
        total: Paise::from(2280),
        status: OrderStatusType::PaymentPending,
        payment_method: PaymentMethod::UpiQr,
        payment_id: None,
        gateway_intent_id: None,
        payment_proof: None,
        payment_verified: false,
        verified_by: None,
        verified_at: None,
        coupon_code: coupon.map(String::from),
        shipping_address: ShippingAddress {
            street: "14 Marine Drive".into(),
            city: "Mumbai".into(),
            state: "MH".into(),
            zip_code: "400001".into(),
            country: "India".into(),
        },
        latitude: None,
        longitude: None,
        location_accuracy: None,
        location_captured_at: None,
        version: 0,
        created_at: created,
        updated_at: created,
    }
}
