use actix_web::{http::StatusCode, test, test::TestRequest, web, web::ServiceConfig, App};
use boutique_payment_engine::{
    db_types::{AdminDecision, Order, OrderStatusType, Role, ShippingAddress, User},
    AgentApi,
    MembershipApi,
    OrderFlowApi,
    PaymentGatewayError,
};
use chrono::{Duration, TimeZone, Utc};
use serde_json::{json, Value};

use super::{
    helpers::{get_request, issue_token, order_fixture, post_request, put_request},
    mocks::MockBackend,
};
use crate::routes::{
    AdminDecidePaymentRoute,
    AgentOrdersRoute,
    MembershipStatusRoute,
    MyOrdersRoute,
    OrderByIdRoute,
    OrdersRoute,
    UpdateOrderStatusRoute,
    ValidateCouponRoute,
};

#[actix_web::test]
async fn fetch_my_orders_without_a_token() {
    let _ = env_logger::try_init().ok();
    let err = get_request("", "/orders/mine", configure_my_orders(vec![])).await.expect_err("Expected error");
    assert_eq!(err, "Authentication Error. No access token was provided.");
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    let orders = vec![order_fixture(1, 1, None), order_fixture(2, 1, Some("ABC123"))];
    let (status, body) = get_request(&token, "/orders/mine", configure_my_orders(orders)).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["count"], json!(2));
    assert_eq!(body["orders"][0]["orderNumber"], json!("ORD-100001-TESTX"));
    assert_eq!(body["orders"][0]["total"], json!(2280));
}

#[actix_web::test]
async fn fetch_my_orders_with_tampered_token() {
    let _ = env_logger::try_init().ok();
    let mut token = issue_token(1, "Asha", vec![Role::User], None);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    let err = get_request(&token, "/orders/mine", configure_my_orders(vec![])).await.expect_err("Expected error");
    assert!(err.contains("Access token is invalid"), "was: {err}");
}

#[actix_web::test]
async fn buyers_may_only_fetch_their_own_orders() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    let (status, body) =
        get_request(&token, "/orders/5", configure_order_by_id(order_fixture(5, 99, None))).await.unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("You may only view your own orders."), "was: {body}");
}

#[actix_web::test]
async fn admins_may_fetch_any_order() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Priya", vec![Role::User, Role::Admin], None);
    let (status, body) =
        get_request(&token, "/orders/5", configure_order_by_id(order_fixture(5, 99, None))).await.unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["userId"], json!(99));
}

#[actix_web::test]
async fn unscoped_listing_requires_the_admin_role() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    let err = get_request(&token, "/orders", configure_search(vec![])).await.expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions.");
}

#[actix_web::test]
async fn review_queues_filter_on_verification() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, "Priya", vec![Role::Admin], None);
    let (status, body) = get_request(&token, "/orders?verified=false", |cfg: &mut ServiceConfig| {
        let mut backend = MockBackend::new();
        backend
            .expect_search_orders()
            .withf(|query| query.payment_verified == Some(false) && query.statuses.is_empty())
            .returning(|_| Ok(vec![order_fixture(1, 1, None)]));
        cfg.service(OrdersRoute::<MockBackend>::new()).app_data(web::Data::new(OrderFlowApi::new(backend)));
    })
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["orders"][0]["paymentVerified"], json!(false));
}

#[actix_web::test]
async fn update_order_status_moves_the_order_along() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, "Priya", vec![Role::Admin], None);
    let (status, body) = put_request(
        &token,
        "/orders/42/status",
        json!({"status": "processing"}),
        configure_update_status(|_, _, _| {
            let mut order = order_fixture(42, 1, None);
            order.status = OrderStatusType::Processing;
            order.payment_verified = true;
            Ok(order)
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["status"], json!("processing"));
}

#[actix_web::test]
async fn illegal_transitions_are_rejected() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, "Priya", vec![Role::Admin], None);
    let (status, body) = put_request(
        &token,
        "/orders/42/status",
        json!({"status": "payment_pending"}),
        configure_update_status(|_, _, _| {
            Err(PaymentGatewayError::InvalidStatusTransition {
                from: OrderStatusType::Delivered,
                to: OrderStatusType::PaymentPending,
            })
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("Cannot change order status"), "was: {body}");
}

#[actix_web::test]
async fn stale_status_updates_are_conflicts() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, "Priya", vec![Role::Admin], None);
    let (status, body) = put_request(
        &token,
        "/orders/42/status",
        json!({"status": "shipped", "expectedVersion": 1}),
        configure_update_status(|_, _, _| Err(PaymentGatewayError::Conflict { expected: 1, actual: 2 })),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("expected version 1"), "was: {body}");
}

#[actix_web::test]
async fn admin_decisions_record_the_verified_identity() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(7, "Priya", vec![Role::Admin], None);
    let (status, body) = post_request(
        &token,
        "/orders/verify-payment",
        json!({"orderId": 42, "action": "verify"}),
        |cfg: &mut ServiceConfig| {
            let mut backend = MockBackend::new();
            backend
                .expect_record_admin_decision()
                // The audit identity comes from the claims, never from the request body.
                .withf(|id, admin, decision| *id == 42 && admin == "Priya#7" && *decision == AdminDecision::Verify)
                .returning(|_, admin, _| {
                    let mut order = order_fixture(42, 1, None);
                    order.status = OrderStatusType::PaymentVerified;
                    order.payment_verified = true;
                    order.verified_by = Some(admin.to_string());
                    Ok(order)
                });
            cfg.service(AdminDecidePaymentRoute::<MockBackend>::new())
                .app_data(web::Data::new(OrderFlowApi::new(backend)));
        },
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["paymentVerified"], json!(true));
    assert_eq!(body["verifiedBy"], json!("Priya#7"));
}

#[actix_web::test]
async fn agent_view_is_coupon_scoped() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(21, "Rahul", vec![Role::Agent], Some(3));
    let (status, body) = get_request(&token, "/agent/orders", |cfg: &mut ServiceConfig| {
        let mut backend = MockBackend::new();
        backend
            .expect_orders_for_agent()
            .withf(|agent_id| *agent_id == 3)
            .returning(|_| Ok(vec![order_fixture(1, 1, Some("ABC123"))]));
        cfg.service(AgentOrdersRoute::<MockBackend>::new()).app_data(web::Data::new(AgentApi::new(backend)));
    })
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["count"], json!(1));
    assert_eq!(body["orders"][0]["couponCode"], json!("ABC123"));
}

#[actix_web::test]
async fn agent_view_requires_the_agent_role() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    let err = get_request(&token, "/agent/orders", |cfg: &mut ServiceConfig| {
        cfg.service(AgentOrdersRoute::<MockBackend>::new())
            .app_data(web::Data::new(AgentApi::new(MockBackend::new())));
    })
    .await
    .expect_err("Expected error");
    assert_eq!(err, "Insufficient permissions.");
}

#[actix_web::test]
async fn agent_view_requires_an_agent_identity() {
    let _ = env_logger::try_init().ok();
    // An agent-role token without an agent id cannot resolve a partition; nothing is returned.
    let token = issue_token(21, "Rahul", vec![Role::Agent], None);
    let (status, body) = get_request(&token, "/agent/orders", |cfg: &mut ServiceConfig| {
        cfg.service(AgentOrdersRoute::<MockBackend>::new())
            .app_data(web::Data::new(AgentApi::new(MockBackend::new())));
    })
    .await
    .unwrap();
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("No agent identity"), "was: {body}");
}

#[actix_web::test]
async fn coupon_validation_is_public() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_validate_coupon().withf(|code| code == "ABC123").returning(|_| Ok(true));
    let app = App::new().configure(|cfg| {
        cfg.service(ValidateCouponRoute::<MockBackend>::new()).app_data(web::Data::new(AgentApi::new(backend)));
    });
    let service = test::init_service(app).await;
    let req = TestRequest::post().uri("/coupons/validate").set_json(json!({"couponCode": "ABC123"})).to_request();
    let res = test::call_service(&service, req).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = test::read_body_json(res).await;
    assert_eq!(body["valid"], json!(true));
}

#[actix_web::test]
async fn membership_status_is_derived() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    let (status, body) = get_request(&token, "/membership/status", |cfg: &mut ServiceConfig| {
        let mut backend = MockBackend::new();
        backend.expect_fetch_user().returning(|id| Ok(Some(premium_user(id, Utc::now() + Duration::days(30)))));
        cfg.service(MembershipStatusRoute::<MockBackend>::new())
            .app_data(web::Data::new(MembershipApi::new(backend)));
    })
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["isPremium"], json!(true));
}

#[actix_web::test]
async fn lapsed_memberships_read_as_not_premium() {
    let _ = env_logger::try_init().ok();
    let token = issue_token(1, "Asha", vec![Role::User], None);
    let (status, body) = get_request(&token, "/membership/status", |cfg: &mut ServiceConfig| {
        let mut backend = MockBackend::new();
        backend.expect_fetch_user().returning(|id| Ok(Some(premium_user(id, Utc::now() - Duration::days(1)))));
        cfg.service(MembershipStatusRoute::<MockBackend>::new())
            .app_data(web::Data::new(MembershipApi::new(backend)));
    })
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["isPremium"], json!(false));
}

fn configure_my_orders(orders: Vec<Order>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut backend = MockBackend::new();
        backend.expect_fetch_orders_for_user().returning(move |_| Ok(orders.clone()));
        cfg.service(MyOrdersRoute::<MockBackend>::new()).app_data(web::Data::new(OrderFlowApi::new(backend)));
    }
}

fn configure_order_by_id(order: Order) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut backend = MockBackend::new();
        backend.expect_fetch_order_by_id().returning(move |_| Ok(Some(order.clone())));
        cfg.service(OrderByIdRoute::<MockBackend>::new()).app_data(web::Data::new(OrderFlowApi::new(backend)));
    }
}

fn configure_search(orders: Vec<Order>) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut backend = MockBackend::new();
        backend.expect_search_orders().returning(move |_| Ok(orders.clone()));
        cfg.service(OrdersRoute::<MockBackend>::new()).app_data(web::Data::new(OrderFlowApi::new(backend)));
    }
}

fn configure_update_status(
    result: fn(i64, OrderStatusType, Option<i64>) -> Result<Order, PaymentGatewayError>,
) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let mut backend = MockBackend::new();
        backend.expect_update_order_status().returning(move |id, status, version| result(id, status, version));
        cfg.service(UpdateOrderStatusRoute::<MockBackend>::new())
            .app_data(web::Data::new(OrderFlowApi::new(backend)));
    }
}

fn premium_user(id: i64, expiry: chrono::DateTime<Utc>) -> User {
    let created = Utc.with_ymd_and_hms(2024, 11, 2, 9, 0, 0).unwrap();
    User {
        id,
        name: "Asha".into(),
        email: "asha@example.com".into(),
        is_premium: true,
        membership_expiry: Some(expiry),
        address: ShippingAddress {
            street: "14 Marine Drive".into(),
            city: "Mumbai".into(),
            state: "MH".into(),
            zip_code: "400001".into(),
            country: "India".into(),
        },
        created_at: created,
        updated_at: created,
    }
}
