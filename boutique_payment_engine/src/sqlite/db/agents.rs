use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Agent, Coupon, NewAgent},
    traits::PaymentGatewayError,
};

pub async fn fetch_agent(id: i64, conn: &mut SqliteConnection) -> Result<Option<Agent>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM agents WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Fetches an *active* coupon whose owning agent is also still active. Coupon codes are matched
/// case-insensitively; they are stored uppercased.
pub async fn fetch_active_coupon(code: &str, conn: &mut SqliteConnection) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as(
        "SELECT coupons.* FROM coupons JOIN agents ON agents.id = coupons.agent_id WHERE coupons.code = $1 AND \
         coupons.is_active = 1 AND agents.is_active = 1",
    )
    .bind(code.trim().to_uppercase())
    .fetch_optional(conn)
    .await
}

/// Creates the agent row and its coupon. Call inside a transaction; a duplicate username or coupon code fails the
/// whole provisioning.
pub async fn insert_agent_with_coupon(agent: &NewAgent, conn: &mut SqliteConnection) -> Result<Agent, sqlx::Error> {
    let code = agent.coupon_code.trim().to_uppercase();
    let created: Agent = sqlx::query_as(
        "INSERT INTO agents (username, name, coupon_code) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&agent.username)
    .bind(&agent.name)
    .bind(&code)
    .fetch_one(&mut *conn)
    .await?;
    sqlx::query("INSERT INTO coupons (code, agent_id) VALUES ($1, $2)")
        .bind(&code)
        .bind(created.id)
        .execute(conn)
        .await?;
    debug!("🗃️ Agent {} provisioned with coupon {code}", created.username);
    Ok(created)
}

/// Revokes an agent by flipping the agent and their coupon inactive. Rows are never deleted; a deactivated coupon
/// stays on historical orders.
pub async fn deactivate_agent(agent_id: i64, conn: &mut SqliteConnection) -> Result<Option<Agent>, sqlx::Error> {
    let agent: Option<Agent> = sqlx::query_as(
        "UPDATE agents SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = $1 RETURNING *",
    )
    .bind(agent_id)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some(agent) = &agent {
        sqlx::query("UPDATE coupons SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE agent_id = $1")
            .bind(agent.id)
            .execute(conn)
            .await?;
    }
    Ok(agent)
}

pub fn validate_agent_active(agent: Option<Agent>, agent_id: i64) -> Result<Agent, PaymentGatewayError> {
    match agent {
        Some(agent) if agent.is_active => Ok(agent),
        _ => Err(PaymentGatewayError::AgentNotFound(agent_id)),
    }
}
