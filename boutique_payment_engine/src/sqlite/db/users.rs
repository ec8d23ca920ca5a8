use chrono::{DateTime, Months, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{db_types::User, traits::PaymentGatewayError};

pub async fn fetch_user(id: i64, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Sets the premium flag and moves the expiry to `now + duration_months`. A repeat grant resets the window from
/// now; it does not stack onto the previous expiry.
pub async fn grant_premium(
    user_id: i64,
    duration_months: u32,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<User, PaymentGatewayError> {
    let expiry = now
        .checked_add_months(Months::new(duration_months))
        .ok_or_else(|| PaymentGatewayError::validation("durationMonths", "membership duration is out of range"))?;
    let user: Option<User> = sqlx::query_as(
        "UPDATE users SET is_premium = 1, membership_expiry = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 \
         RETURNING *",
    )
    .bind(expiry)
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    let user = user.ok_or(PaymentGatewayError::UserNotFound(user_id))?;
    debug!("🗃️ User {user_id} is premium until {expiry}");
    Ok(user)
}

/// Users with the premium flag set. The expiry check happens in Rust — membership is a derived property, and
/// comparing heterogeneous timestamp encodings inside SQLite is a trap.
pub async fn fetch_premium_flagged_users(conn: &mut SqliteConnection) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE is_premium = 1 ORDER BY membership_expiry DESC").fetch_all(conn).await
}
