use thiserror::Error;

use crate::{
    db_types::{
        AdminDecision,
        NewOrder,
        NewPaymentIntent,
        Order,
        OrderNumber,
        OrderStatusType,
        PaymentIntent,
    },
    traits::{GatewayConfirmation, OrderManagement},
};

/// The write-side of the order ledger: creation, status transitions, the manual-proof workflow and the gateway
/// confirmation flow. This is the only trait that mutates orders.
///
/// Implementations must uphold three contracts:
/// * **All-or-nothing writes.** A flow that touches several rows (order + items, status + stock) runs in a single
///   transaction; a failure on any row leaves no partial mutation behind.
/// * **Exactly-once side effects.** Gateway confirmations are deduplicated by intent id before stock is decremented
///   or membership granted, no matter how many times the same confirmation is delivered.
/// * **Legal transitions only.** Status changes are validated against
///   [`OrderStatusType::allowed_next`]; an illegal transition is an error, not a write.
#[allow(async_fn_in_trait)]
pub trait PaymentGatewayDatabase: Clone + OrderManagement {
    /// The URL of the backing store.
    fn url(&self) -> &str;

    /// Persists a validated new order (status `payment_pending`, unverified) together with its line items.
    ///
    /// The generated order number is unique under concurrent creation: the insert retries with a fresh number on a
    /// uniqueness conflict. Stock is **not** touched here.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError>;

    /// Transitions an order to `new_status`, after checking the transition table.
    ///
    /// When `expected_version` is given, the update only applies if the order's version still matches, and fails
    /// with [`PaymentGatewayError::Conflict`] otherwise (stale read detection for concurrent admin edits).
    async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        expected_version: Option<i64>,
    ) -> Result<Order, PaymentGatewayError>;

    /// Attaches a payment-proof URL to the order and moves it into the admin review queue
    /// (`payment_pending → pending`). Resubmission while already `pending` replaces the proof.
    async fn attach_payment_proof(&self, order_id: i64, proof_url: &str) -> Result<Order, PaymentGatewayError>;

    /// Applies an admin's verify/reject decision on a manually-paid order.
    ///
    /// * `Verify` — requires the order to be awaiting confirmation; sets `payment_verified`, records the deciding
    ///   admin and timestamp, moves to `payment_verified` **and decrements stock for every line item** in the same
    ///   transaction. If any item is out of stock the whole decision rolls back.
    /// * `Reject` — clears `payment_verified`, records the rejecting admin for audit, and returns the order to
    ///   `payment_pending` so the buyer can resubmit. The proof URL is retained.
    ///
    /// The status change is a conditional update, so two racing admins resolve to exactly one winner.
    async fn record_admin_decision(
        &self,
        order_id: i64,
        admin: &str,
        decision: AdminDecision,
    ) -> Result<Order, PaymentGatewayError>;

    /// Records a freshly-created remote payment intent, including the order draft captured at creation time and
    /// the expiry deadline after which verification is refused.
    async fn insert_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, PaymentGatewayError>;

    async fn fetch_payment_intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, PaymentGatewayError>;

    /// Applies a gateway payment confirmation, idempotently.
    ///
    /// In one transaction: claim the intent in the payment-event ledger (`INSERT OR IGNORE`); if it was already
    /// claimed, return [`GatewayConfirmation::AlreadyProcessed`] without further effect. Otherwise branch on the
    /// intent's order type:
    /// * `product` — create the ledger entry from the intent's stored draft (or `fallback_order` for intents that
    ///   predate draft capture) unless an order for this intent already exists; attach `payment_id`; mark the order
    ///   `payment_verified`; decrement stock once per line item.
    /// * `membership` — grant premium membership to the intent's user.
    async fn confirm_gateway_payment(
        &self,
        intent_id: &str,
        payment_id: &str,
        fallback_order: Option<NewOrder>,
    ) -> Result<GatewayConfirmation, PaymentGatewayError>;

    /// Marks an intent as failed (webhook `payment.failed`). Never touches orders or stock.
    async fn mark_intent_failed(&self, intent_id: &str) -> Result<(), PaymentGatewayError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), PaymentGatewayError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Required field '{field}' is missing or invalid: {message}")]
    ValidationError { field: String, message: String },
    #[error("The requested order (internal id {0}) does not exist")]
    OrderIdNotFound(i64),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderNumber),
    #[error("The requested product {0} does not exist")]
    ProductNotFound(i64),
    #[error("The requested user {0} does not exist")]
    UserNotFound(i64),
    #[error("The requested agent {0} does not exist or has been deactivated")]
    AgentNotFound(i64),
    #[error("Coupon code {0} does not exist or is not active")]
    CouponNotFound(String),
    #[error("Cannot change order status from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatusType, to: OrderStatusType },
    #[error("The order was modified by someone else. Expected version {expected}, found {actual}")]
    Conflict { expected: i64, actual: i64 },
    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    OutOfStock { product_id: i64, requested: i64, available: i64 },
    #[error("The payment intent {0} does not exist")]
    IntentNotFound(String),
    #[error("The payment intent {0} has expired and can no longer be verified")]
    IntentExpired(String),
    #[error("Could not generate a unique order number after multiple attempts")]
    OrderNumberExhausted,
    #[error("The intent carries no order details and no fallback was supplied")]
    MissingOrderDetails,
}

impl PaymentGatewayError {
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::ValidationError { field: field.into(), message: message.into() }
    }
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for PaymentGatewayError {
    fn from(e: serde_json::Error) -> Self {
        PaymentGatewayError::DatabaseError(format!("Malformed stored payload: {e}"))
    }
}
