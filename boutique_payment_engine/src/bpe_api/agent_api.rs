use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Agent, NewAgent, Order},
    traits::{AgentAccess, PaymentGatewayError},
};

/// The coupon-scoped access partition: coupon validation at checkout, and the agent-facing order view.
pub struct AgentApi<B> {
    db: B,
}

impl<B> Debug for AgentApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AgentApi")
    }
}

impl<B> AgentApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AgentApi<B>
where B: AgentAccess
{
    /// `true` iff an active coupon with this code exists (and its owning agent is still active).
    pub async fn validate_coupon(&self, code: &str) -> Result<bool, PaymentGatewayError> {
        self.db.validate_coupon(code).await
    }

    /// The orders visible to this agent: exactly those carrying the agent's own coupon code. The filter runs
    /// server-side; an agent principal never touches the unscoped ledger.
    pub async fn orders_visible_to(&self, agent_id: i64) -> Result<Vec<Order>, PaymentGatewayError> {
        let orders = self.db.orders_for_agent(agent_id).await?;
        debug!("🎫️ Agent {agent_id} sees {} order(s) in their partition", orders.len());
        Ok(orders)
    }

    pub async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, PaymentGatewayError> {
        self.db.fetch_agent(agent_id).await
    }

    /// Provisions a new agent together with their single coupon code.
    pub async fn create_agent(&self, agent: NewAgent) -> Result<Agent, PaymentGatewayError> {
        if agent.username.trim().is_empty() {
            return Err(PaymentGatewayError::validation("username", "username must not be blank"));
        }
        if agent.coupon_code.trim().is_empty() {
            return Err(PaymentGatewayError::validation("couponCode", "coupon code must not be blank"));
        }
        let agent = self.db.create_agent(agent).await?;
        info!("🎫️ Agent {} provisioned with coupon {}", agent.username, agent.coupon_code);
        Ok(agent)
    }

    /// Revokes an agent and their coupon. Historical orders keep the (now inactive) code.
    pub async fn deactivate_agent(&self, agent_id: i64) -> Result<Agent, PaymentGatewayError> {
        self.db.deactivate_agent(agent_id).await
    }
}
