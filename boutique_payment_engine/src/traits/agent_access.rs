use crate::{
    db_types::{Agent, Coupon, NewAgent, Order},
    traits::PaymentGatewayError,
};

/// Agent identities, their coupon codes, and the coupon-scoped order partition.
///
/// The scoped query is the *only* order-reading surface an agent principal may reach: the filter runs server-side
/// against the agent's own active coupon, so one agent's request can never materialise another agent's orders.
#[allow(async_fn_in_trait)]
pub trait AgentAccess: Clone {
    async fn fetch_agent(&self, agent_id: i64) -> Result<Option<Agent>, PaymentGatewayError>;

    async fn fetch_coupon(&self, code: &str) -> Result<Option<Coupon>, PaymentGatewayError>;

    /// `true` iff an *active* coupon with this code exists. Codes are matched case-insensitively.
    async fn validate_coupon(&self, code: &str) -> Result<bool, PaymentGatewayError>;

    /// The orders visible to the given agent: exactly those carrying the agent's own coupon code, newest first.
    /// Fails with [`PaymentGatewayError::AgentNotFound`] for unknown or deactivated agents.
    async fn orders_for_agent(&self, agent_id: i64) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Provisions an agent together with their coupon in one transaction. Duplicate usernames or coupon codes are
    /// rejected.
    async fn create_agent(&self, agent: NewAgent) -> Result<Agent, PaymentGatewayError>;

    /// Revokes an agent: flips the agent and their coupon inactive. Nothing is ever hard-deleted.
    async fn deactivate_agent(&self, agent_id: i64) -> Result<Agent, PaymentGatewayError>;
}
