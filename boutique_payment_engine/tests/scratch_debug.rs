mod support;
use support::{prepare_test_db, seed_user};
use boutique_payment_engine::MembershipApi;

#[tokio::test]
async fn scratch_probe() {
    let db = prepare_test_db().await;
    eprintln!("URL pool connections probe");
    let membership = MembershipApi::new(db.clone());
    let user_id = seed_user(&db, "Asha", "asha@example.com").await;
    eprintln!("SEEDED user_id = {user_id}");

    let mut none_count = 0;
    let mut some_count = 0;
    for _ in 0..30 {
        match membership.fetch_user(user_id).await {
            Ok(Some(_)) => some_count += 1,
            Ok(None) => none_count += 1,
            Err(e) => eprintln!("Err: {e:?}"),
        }
    }
    eprintln!("fetch_user over 30 tries: some={some_count} none={none_count}");

    // Count per fresh acquired connection
    use sqlx::Acquire;
    for i in 0..8 {
        let mut c = db.pool().acquire().await.unwrap();
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *c).await.unwrap();
        eprintln!("conn {i}: users count = {n}");
    }
}
