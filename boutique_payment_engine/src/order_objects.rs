//! Query-side objects for the order ledger: the search filter and the result wrappers returned to API consumers.

use serde::{Deserialize, Serialize};

use crate::db_types::{Order, OrderNumber, OrderStatusType};

/// A composable filter for ledger searches. Every field is optional; an empty filter returns the whole ledger
/// (admin-only — the server never exposes an unscoped search to buyers or agents).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderQueryFilter {
    pub user_id: Option<i64>,
    pub order_number: Option<OrderNumber>,
    pub coupon_code: Option<String>,
    pub payment_verified: Option<bool>,
    #[serde(default)]
    pub statuses: Vec<OrderStatusType>,
}

impl OrderQueryFilter {
    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_order_number(mut self, order_number: OrderNumber) -> Self {
        self.order_number = Some(order_number);
        self
    }

    pub fn with_coupon_code<S: Into<String>>(mut self, code: S) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    pub fn with_payment_verified(mut self, verified: bool) -> Self {
        self.payment_verified = Some(verified);
        self
    }

    pub fn with_status(mut self, status: OrderStatusType) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.user_id.is_none() &&
            self.order_number.is_none() &&
            self.coupon_code.is_none() &&
            self.payment_verified.is_none() &&
            self.statuses.is_empty()
    }
}

/// A list of orders plus the totals an admin dashboard wants alongside it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub orders: Vec<Order>,
    pub count: usize,
}

impl From<Vec<Order>> for OrderResult {
    fn from(orders: Vec<Order>) -> Self {
        let count = orders.len();
        Self { orders, count }
    }
}
