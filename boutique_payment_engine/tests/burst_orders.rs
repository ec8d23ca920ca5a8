//! Order-number uniqueness under concurrent creation. The generator is timestamp-plus-random, which *will*
//! collide eventually; the UNIQUE constraint plus retry is what keeps the ledger consistent, and this test leans
//! on it with a burst of parallel creations.

use std::collections::HashSet;

use boutique_payment_engine::{db_types::NewOrder, OrderFlowApi};
use bps_common::Paise;
use futures_util::future::join_all;
use support::{address, item, prepare_test_db, seed_product, seed_user};

mod support;

const NUM_ORDERS: usize = 20;

#[tokio::test(flavor = "multi_thread")]
async fn burst_orders_get_unique_order_numbers() {
    let db = prepare_test_db().await;
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    let product_id = seed_product(&db, "Eau de parfum", 1000, 1000, false).await;

    let tasks = (0..NUM_ORDERS).map(|_| {
        let db = db.clone();
        tokio::spawn(async move {
            let api = OrderFlowApi::new(db);
            let draft =
                NewOrder::new(user_id, vec![item(product_id, 1000, 1)], Paise::from(50), Paise::from(90), address());
            api.create_order(draft).await
        })
    });
    let orders: Vec<_> = join_all(tasks).await.into_iter().map(|r| r.unwrap().expect("order creation failed")).collect();

    assert_eq!(orders.len(), NUM_ORDERS);
    let numbers: HashSet<String> = orders.iter().map(|o| o.order_number.as_str().to_string()).collect();
    assert_eq!(numbers.len(), NUM_ORDERS, "every order number must be unique");
    assert!(orders.iter().all(|o| o.totals_are_consistent()));
}
