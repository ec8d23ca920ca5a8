//! Races that the engine must resolve deterministically: two buyers fighting over the last units of a product, and
//! the same gateway confirmation arriving on two paths at once.

use boutique_payment_engine::{
    db_types::{NewOrder, OrderType},
    GatewayConfirmation,
    InventoryManagement,
    OrderFlowApi,
    PaymentGatewayError,
};
use bps_common::Paise;
use chrono::{Duration, Utc};
use support::{address, item, prepare_test_db, seed_product, seed_user, stock_level};

mod support;

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_decrements_have_exactly_one_winner() {
    let db = prepare_test_db().await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 5, false).await;

    let db_a = db.clone();
    let db_b = db.clone();
    let a = tokio::spawn(async move { db_a.reserve_and_decrement(product_id, 3).await });
    let b = tokio::spawn(async move { db_b.reserve_and_decrement(product_id, 3).await });
    let (a, b) = (a.await.unwrap(), b.await.unwrap());

    let winners = [a.is_ok(), b.is_ok()].into_iter().filter(|won| *won).count();
    assert_eq!(winners, 1, "expected exactly one winner, got {a:?} / {b:?}");
    let (winner, loser) = if a.is_ok() { (a, b) } else { (b, a) };
    assert_eq!(winner.unwrap(), 2);
    let err = loser.unwrap_err();
    assert!(
        matches!(err, PaymentGatewayError::OutOfStock { requested: 3, available: 2, .. }),
        "{err}"
    );
    // Never negative, never partially applied.
    assert_eq!(stock_level(&db, product_id).await, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn racing_confirmations_apply_side_effects_once() {
    let db = prepare_test_db().await;
    let api = OrderFlowApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 10, false).await;

    let draft = NewOrder::new(user_id, vec![item(product_id, 1000, 2)], Paise::from(0), Paise::from(0), address());
    let details = serde_json::to_string(&draft).unwrap();
    api.record_payment_intent(
        "intent_race",
        draft.total,
        "INR",
        OrderType::Product,
        user_id,
        Some(details),
        Utc::now() + Duration::hours(2),
    )
    .await
    .unwrap();

    // The synchronous verify call and the webhook land at the same time.
    let db_a = db.clone();
    let db_b = db.clone();
    let a = tokio::spawn(async move {
        OrderFlowApi::new(db_a).confirm_gateway_payment("intent_race", "pay_1", None).await
    });
    let b = tokio::spawn(async move {
        OrderFlowApi::new(db_b).confirm_gateway_payment("intent_race", "pay_1", None).await
    });
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    let applied = [&a, &b].iter().filter(|c| c.was_applied()).count();
    assert_eq!(applied, 1, "exactly one delivery applies the confirmation: {a:?} / {b:?}");
    assert!(matches!(a, GatewayConfirmation::AlreadyProcessed) || matches!(b, GatewayConfirmation::AlreadyProcessed));

    // One order, one stock decrement, no matter which path won.
    assert_eq!(stock_level(&db, product_id).await, 8);
    assert_eq!(api.fetch_orders_for_user(user_id).await.unwrap().len(), 1);
}
