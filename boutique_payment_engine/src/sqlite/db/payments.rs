use sqlx::SqliteConnection;

use crate::db_types::{IntentStatus, NewPaymentIntent, PaymentIntent};

/// The idempotency-key kind for a full gateway confirmation (sync verify call or `payment.captured` /
/// `order.paid` webhook). One kind per intent: every delivery after the first is a no-op.
pub const EVENT_KIND_CONFIRMATION: &str = "confirmation";

pub async fn insert_intent(
    intent: &NewPaymentIntent,
    conn: &mut SqliteConnection,
) -> Result<PaymentIntent, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO payment_intents (intent_id, amount, currency, order_type, user_id, details, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(&intent.intent_id)
    .bind(intent.amount)
    .bind(&intent.currency)
    .bind(intent.order_type)
    .bind(intent.user_id)
    .bind(intent.details.as_deref())
    .bind(intent.expires_at)
    .fetch_one(conn)
    .await
}

pub async fn fetch_intent(intent_id: &str, conn: &mut SqliteConnection) -> Result<Option<PaymentIntent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payment_intents WHERE intent_id = $1").bind(intent_id).fetch_optional(conn).await
}

/// Claims the idempotency key for `(intent_id, kind)`. Returns `true` iff this caller made the claim — i.e. the
/// associated side effects have not been applied before and this transaction owns them. `INSERT OR IGNORE` against
/// the unique index makes the claim race-free.
pub async fn claim_event(
    intent_id: &str,
    payment_id: &str,
    kind: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("INSERT OR IGNORE INTO payment_events (intent_id, payment_id, kind) VALUES ($1, $2, $3)")
        .bind(intent_id)
        .bind(payment_id)
        .bind(kind)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn set_intent_status(
    intent_id: &str,
    status: IntentStatus,
    conn: &mut SqliteConnection,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE payment_intents SET status = $1 WHERE intent_id = $2")
        .bind(status)
        .bind(intent_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected())
}
