//! End-to-end tests of the order ledger flows against a real (throwaway) SQLite database: creation and
//! validation, the manual proof workflow, status transitions, gateway confirmations and the membership and
//! agent-partition paths.

use boutique_payment_engine::{
    db_types::{AdminDecision, NewAgent, NewOrder, OrderStatusType, OrderType},
    AgentApi,
    GatewayConfirmation,
    MembershipApi,
    OrderFlowApi,
    PaymentGatewayError,
};
use bps_common::Paise;
use chrono::{Duration, Utc};
use support::{address, item, premium_item, prepare_test_db, seed_premium_user, seed_product, seed_user, stock_level};

mod support;

#[tokio::test]
async fn create_order_happy_path() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let draft = NewOrder::new(user_id, vec![item(product_id, 1000, 2)], Paise::from(100), Paise::from(180), address());
    let order = api.create_order(draft).await.unwrap();

    assert_eq!(order.subtotal, Paise::from(2000));
    assert_eq!(order.total, Paise::from(2280));
    assert!(order.totals_are_consistent());
    assert_eq!(order.status, OrderStatusType::PaymentPending);
    assert!(!order.payment_verified);
    assert!(order.order_number.as_str().starts_with("ORD-"));
    // Creation never touches stock; that only happens on a confirmed payment.
    assert_eq!(stock_level(&db, product_id).await, 10);
}

#[tokio::test]
async fn create_order_rejects_blank_address() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;

    let mut bad_address = address();
    bad_address.city = "  ".into();
    let draft = NewOrder::new(user_id, vec![item(1, 500, 1)], Paise::from(0), Paise::from(0), bad_address);
    let err = api.create_order(draft).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::ValidationError { ref field, .. } if field == "city"), "{err}");
}

#[tokio::test]
async fn create_order_rejects_inconsistent_totals() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;

    let mut draft = NewOrder::new(user_id, vec![item(1, 1000, 2)], Paise::from(100), Paise::from(180), address());
    draft.total = Paise::from(2279);
    let err = api.create_order(draft).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::ValidationError { ref field, .. } if field == "total"), "{err}");

    let mut draft = NewOrder::new(user_id, vec![item(1, 1000, 2)], Paise::from(100), Paise::from(180), address());
    draft.subtotal = Paise::from(1999);
    draft.total = Paise::from(2279);
    let err = api.create_order(draft).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::ValidationError { ref field, .. } if field == "subtotal"), "{err}");
}

#[tokio::test]
async fn create_order_rejects_unknown_coupon() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;

    let draft = NewOrder::new(user_id, vec![item(1, 500, 1)], Paise::from(0), Paise::from(0), address())
        .with_coupon("NOSUCH");
    let err = api.create_order(draft).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::CouponNotFound(ref code) if code == "NOSUCH"), "{err}");
}

#[tokio::test]
async fn premium_items_require_a_coupon() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let agents = AgentApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Limited edition", 5000, 3, true).await;
    agents
        .create_agent(NewAgent { username: "priya".into(), name: "Priya".into(), coupon_code: "ABC123".into() })
        .await
        .unwrap();

    let draft =
        NewOrder::new(user_id, vec![premium_item(product_id, 5000, 1)], Paise::from(0), Paise::from(0), address());
    let err = api.create_order(draft.clone()).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::ValidationError { ref field, .. } if field == "couponCode"), "{err}");

    let order = api.create_order(draft.with_coupon("ABC123")).await.unwrap();
    assert_eq!(order.coupon_code.as_deref(), Some("ABC123"));
}

#[tokio::test]
async fn manual_proof_verify_flow() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let draft = NewOrder::new(user_id, vec![item(product_id, 1000, 2)], Paise::from(100), Paise::from(180), address());
    let order = api.create_order(draft).await.unwrap();

    let order = api.submit_payment_proof(order.id, "/uploads/proof_1.png").await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.payment_proof.as_deref(), Some("/uploads/proof_1.png"));
    assert!(!order.payment_verified);

    let order = api.record_admin_decision(order.id, "ops#1", AdminDecision::Verify).await.unwrap();
    assert_eq!(order.status, OrderStatusType::PaymentVerified);
    assert!(order.payment_verified);
    assert_eq!(order.verified_by.as_deref(), Some("ops#1"));
    assert!(order.verified_at.is_some());
    // The verify decision reserves stock, once per line item.
    assert_eq!(stock_level(&db, product_id).await, 8);
}

#[tokio::test]
async fn manual_proof_rejection_resets_the_order() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let draft = NewOrder::new(user_id, vec![item(product_id, 1000, 1)], Paise::from(0), Paise::from(0), address());
    let order = api.create_order(draft).await.unwrap();
    let order = api.submit_payment_proof(order.id, "/uploads/proof_1.png").await.unwrap();

    let order = api.record_admin_decision(order.id, "ops#2", AdminDecision::Reject).await.unwrap();
    assert_eq!(order.status, OrderStatusType::PaymentPending);
    assert!(!order.payment_verified);
    // The rejected proof stays on the record for the audit trail.
    assert_eq!(order.payment_proof.as_deref(), Some("/uploads/proof_1.png"));
    assert_eq!(stock_level(&db, product_id).await, 10);

    // The buyer may resubmit and go through review again.
    let order = api.submit_payment_proof(order.id, "/uploads/proof_2.png").await.unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert_eq!(order.payment_proof.as_deref(), Some("/uploads/proof_2.png"));
}

#[tokio::test]
async fn status_transitions_follow_the_table() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let draft = NewOrder::new(user_id, vec![item(product_id, 1000, 1)], Paise::from(0), Paise::from(0), address());
    let order = api.create_order(draft).await.unwrap();
    let order = api.submit_payment_proof(order.id, "/uploads/proof.png").await.unwrap();
    let order = api.record_admin_decision(order.id, "ops#1", AdminDecision::Verify).await.unwrap();

    let order = api.update_order_status(order.id, OrderStatusType::Processing, None).await.unwrap();
    let order = api.update_order_status(order.id, OrderStatusType::Shipped, None).await.unwrap();
    let order = api.update_order_status(order.id, OrderStatusType::Delivered, None).await.unwrap();
    assert_eq!(order.status, OrderStatusType::Delivered);

    let err = api.update_order_status(order.id, OrderStatusType::PaymentPending, None).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::InvalidStatusTransition { .. }), "{err}");
    let unchanged = api.fetch_order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, OrderStatusType::Delivered);

    let err = api.update_order_status(9999, OrderStatusType::Processing, None).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::OrderIdNotFound(9999)), "{err}");
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let draft = NewOrder::new(user_id, vec![item(product_id, 1000, 1)], Paise::from(0), Paise::from(0), address());
    let order = api.create_order(draft).await.unwrap();
    let order = api.submit_payment_proof(order.id, "/uploads/proof.png").await.unwrap();
    let order = api.record_admin_decision(order.id, "ops#1", AdminDecision::Verify).await.unwrap();

    let stale = order.version;
    let order = api.update_order_status(order.id, OrderStatusType::Processing, Some(stale)).await.unwrap();
    assert_eq!(order.version, stale + 1);

    // A second writer holding the old version must not silently overwrite.
    let err = api.update_order_status(order.id, OrderStatusType::Shipped, Some(stale)).await.unwrap_err();
    assert!(
        matches!(err, PaymentGatewayError::Conflict { expected, actual } if expected == stale && actual == stale + 1),
        "{err}"
    );
}

#[tokio::test]
async fn admin_verify_is_all_or_nothing() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let plentiful = seed_product(&db, "Eau de parfum", 1000, 10, false).await;
    let scarce = seed_product(&db, "Attar", 2000, 1, false).await;

    let items = vec![item(plentiful, 1000, 2), item(scarce, 2000, 3)];
    let draft = NewOrder::new(user_id, items, Paise::from(0), Paise::from(0), address());
    let order = api.create_order(draft).await.unwrap();
    let order = api.submit_payment_proof(order.id, "/uploads/proof.png").await.unwrap();

    let err = api.record_admin_decision(order.id, "ops#1", AdminDecision::Verify).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::OutOfStock { product_id, .. } if product_id == scarce), "{err}");

    // The whole decision rolled back: no partial decrement, no status change, no verification.
    assert_eq!(stock_level(&db, plentiful).await, 10);
    assert_eq!(stock_level(&db, scarce).await, 1);
    let order = api.fetch_order_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(!order.payment_verified);
}

#[tokio::test]
async fn gateway_confirmation_creates_a_verified_order_once() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let draft = NewOrder::new(user_id, vec![item(product_id, 1000, 2)], Paise::from(100), Paise::from(180), address());
    let details = serde_json::to_string(&draft).unwrap();
    api.record_payment_intent(
        "intent_1",
        draft.total,
        "INR",
        OrderType::Product,
        user_id,
        Some(details),
        Utc::now() + Duration::hours(2),
    )
    .await
    .unwrap();

    let confirmation = api.confirm_gateway_payment("intent_1", "pay_42", None).await.unwrap();
    let order = match confirmation {
        GatewayConfirmation::Applied { order: Some(order), .. } => order,
        other => panic!("expected an applied product confirmation, got {other:?}"),
    };
    assert_eq!(order.status, OrderStatusType::PaymentVerified);
    assert!(order.payment_verified);
    assert_eq!(order.payment_id.as_deref(), Some("pay_42"));
    assert_eq!(order.gateway_intent_id.as_deref(), Some("intent_1"));
    assert_eq!(stock_level(&db, product_id).await, 8);

    // The same confirmation delivered again (webhook retry, or the sync path racing the webhook) is absorbed.
    let confirmation = api.confirm_gateway_payment("intent_1", "pay_42", None).await.unwrap();
    assert!(matches!(confirmation, GatewayConfirmation::AlreadyProcessed));
    assert_eq!(stock_level(&db, product_id).await, 8);
    let orders = api.fetch_orders_for_user(user_id).await.unwrap();
    assert_eq!(orders.len(), 1);
}

#[tokio::test]
async fn expired_intent_refuses_confirmation() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let draft = NewOrder::new(user_id, vec![item(product_id, 1000, 1)], Paise::from(0), Paise::from(0), address());
    let details = serde_json::to_string(&draft).unwrap();
    api.record_payment_intent(
        "intent_old",
        draft.total,
        "INR",
        OrderType::Product,
        user_id,
        Some(details),
        Utc::now() - Duration::hours(1),
    )
    .await
    .unwrap();

    let err = api.confirm_gateway_payment("intent_old", "pay_1", None).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::IntentExpired(_)), "{err}");
    assert_eq!(stock_level(&db, product_id).await, 10);
    assert!(api.fetch_orders_for_user(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn confirmation_without_stored_details_needs_a_fallback() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    api.record_payment_intent(
        "intent_bare",
        Paise::from(1000),
        "INR",
        OrderType::Product,
        user_id,
        None,
        Utc::now() + Duration::hours(2),
    )
    .await
    .unwrap();

    let err = api.confirm_gateway_payment("intent_bare", "pay_1", None).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::MissingOrderDetails), "{err}");

    let fallback = NewOrder::new(user_id, vec![item(product_id, 1000, 1)], Paise::from(0), Paise::from(0), address());
    let confirmation = api.confirm_gateway_payment("intent_bare", "pay_1", Some(fallback)).await.unwrap();
    assert!(confirmation.was_applied());
    assert_eq!(stock_level(&db, product_id).await, 9);
}

#[tokio::test]
async fn membership_confirmation_grants_premium() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let membership = MembershipApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    assert!(!membership.is_premium_member(user_id).await.unwrap());

    let details = r#"{"durationMonths":12}"#.to_string();
    api.record_payment_intent(
        "intent_m1",
        Paise::from_rupees(499),
        "INR",
        OrderType::Membership,
        user_id,
        Some(details),
        Utc::now() + Duration::hours(2),
    )
    .await
    .unwrap();
    let confirmation = api.confirm_gateway_payment("intent_m1", "pay_m1", None).await.unwrap();
    assert!(confirmation.was_applied());
    assert!(membership.is_premium_member(user_id).await.unwrap());
    let first_expiry = membership.fetch_user(user_id).await.unwrap().unwrap().membership_expiry.unwrap();

    // A repeat purchase resets the window from now; a shorter renewal pulls the expiry in.
    let details = r#"{"durationMonths":1}"#.to_string();
    api.record_payment_intent(
        "intent_m2",
        Paise::from_rupees(49),
        "INR",
        OrderType::Membership,
        user_id,
        Some(details),
        Utc::now() + Duration::hours(2),
    )
    .await
    .unwrap();
    api.confirm_gateway_payment("intent_m2", "pay_m2", None).await.unwrap();
    let second_expiry = membership.fetch_user(user_id).await.unwrap().unwrap().membership_expiry.unwrap();
    assert!(second_expiry < first_expiry);
    assert!(membership.is_premium_member(user_id).await.unwrap());
}

#[tokio::test]
async fn membership_is_derived_from_flag_and_expiry() {
    let db = prepare_test_db().await;
    let membership = MembershipApi::new(db.clone());
    let lapsed = seed_premium_user(&db, "lapsed@example.com", Utc::now() - Duration::days(1)).await;
    let active = seed_premium_user(&db, "active@example.com", Utc::now() + Duration::days(30)).await;

    assert!(!membership.is_premium_member(lapsed).await.unwrap());
    assert!(membership.is_premium_member(active).await.unwrap());
    let premium_users = membership.fetch_premium_users().await.unwrap();
    assert_eq!(premium_users.len(), 1);
    assert_eq!(premium_users[0].id, active);
}

#[tokio::test]
async fn agents_see_only_their_own_coupon_partition() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let agents = AgentApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let priya = agents
        .create_agent(NewAgent { username: "priya".into(), name: "Priya".into(), coupon_code: "ABC123".into() })
        .await
        .unwrap();
    let rahul = agents
        .create_agent(NewAgent { username: "rahul".into(), name: "Rahul".into(), coupon_code: "XYZ999".into() })
        .await
        .unwrap();

    let base = NewOrder::new(user_id, vec![item(product_id, 1000, 1)], Paise::from(0), Paise::from(0), address());
    api.create_order(base.clone().with_coupon("ABC123")).await.unwrap();
    api.create_order(base.clone().with_coupon("XYZ999")).await.unwrap();
    api.create_order(base).await.unwrap();

    let visible = agents.orders_visible_to(priya.id).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].coupon_code.as_deref(), Some("ABC123"));
    let visible = agents.orders_visible_to(rahul.id).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].coupon_code.as_deref(), Some("XYZ999"));

    // Coupon validation is case-insensitive, and revocation closes both the coupon and the partition.
    assert!(agents.validate_coupon("abc123").await.unwrap());
    agents.deactivate_agent(priya.id).await.unwrap();
    assert!(!agents.validate_coupon("ABC123").await.unwrap());
    let err = agents.orders_visible_to(priya.id).await.unwrap_err();
    assert!(matches!(err, PaymentGatewayError::AgentNotFound(id) if id == priya.id), "{err}");
}
