use crate::{
    db_types::{Order, OrderNumber},
    order_objects::OrderQueryFilter,
    traits::PaymentGatewayError,
};

/// Read-side access to the order ledger.
///
/// `search_orders` with an empty filter returns the whole ledger; callers above this trait are responsible for
/// only reaching it through admin-guarded surfaces. Agent-scoped reads go through
/// [`AgentAccess::orders_for_agent`](crate::traits::AgentAccess::orders_for_agent) instead, which filters
/// server-side.
#[allow(async_fn_in_trait)]
pub trait OrderManagement: Clone {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, PaymentGatewayError>;

    async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, PaymentGatewayError>;

    /// All orders placed by the given buyer, newest first.
    async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, PaymentGatewayError>;

    /// Orders matching the filter, newest first. Line items are attached to every returned order.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError>;
}
