use std::fmt::Debug;

use bps_common::Paise;
use chrono::{DateTime, Utc};
use log::*;

use crate::{
    db_types::{
        AdminDecision,
        NewOrder,
        NewPaymentIntent,
        Order,
        OrderItem,
        OrderNumber,
        OrderStatusType,
        OrderType,
        PaymentIntent,
    },
    order_objects::OrderQueryFilter,
    traits::{AgentAccess, GatewayConfirmation, PaymentGatewayDatabase, PaymentGatewayError},
};

/// `OrderFlowApi` is the primary API for the order ledger: creation, status transitions, the manual-proof review
/// workflow, and the gateway confirmation flows.
pub struct OrderFlowApi<B> {
    db: B,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase + AgentAccess
{
    /// Creates a new ledger entry with status `payment_pending`. Stock is not touched.
    ///
    /// Validation, in order:
    /// * every shipping-address field must be non-blank;
    /// * `subtotal` must equal the sum of the line totals, and `total` must equal `subtotal + shipping + tax`
    ///   (exact integer arithmetic);
    /// * there must be at least one line item, each with a positive quantity and a non-negative price;
    /// * a supplied coupon code must reference an active coupon;
    /// * an order containing a premium line item must carry a coupon code.
    pub async fn create_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        self.validate_new_order(&order).await?;
        let order = self.db.insert_order(order).await?;
        debug!("🛒️ Order {} accepted into the ledger", order.order_number);
        Ok(order)
    }

    /// Validates an order draft without persisting anything. Used both by [`Self::create_order`] and at intent
    /// creation, so a draft stored with a payment intent is known-good before the gateway is involved.
    pub async fn validate_new_order(&self, order: &NewOrder) -> Result<(), PaymentGatewayError> {
        if let Some(field) = order.shipping_address.first_blank_field() {
            return Err(PaymentGatewayError::validation(field, "shipping address field must not be blank"));
        }
        if order.items.is_empty() {
            return Err(PaymentGatewayError::validation("items", "an order needs at least one line item"));
        }
        for item in &order.items {
            if item.quantity <= 0 {
                return Err(PaymentGatewayError::validation("items", "line item quantity must be positive"));
            }
            if item.price.is_negative() {
                return Err(PaymentGatewayError::validation("items", "line item price must not be negative"));
            }
        }
        let line_total: Paise = order.items.iter().map(OrderItem::line_total).sum();
        if line_total != order.subtotal {
            return Err(PaymentGatewayError::validation(
                "subtotal",
                format!("subtotal {} does not match the line-item total {line_total}", order.subtotal),
            ));
        }
        if order.subtotal + order.shipping + order.tax != order.total {
            return Err(PaymentGatewayError::validation(
                "total",
                format!("total {} does not equal subtotal + shipping + tax", order.total),
            ));
        }
        match &order.coupon_code {
            Some(code) => {
                if !self.db.validate_coupon(code).await? {
                    return Err(PaymentGatewayError::CouponNotFound(code.clone()));
                }
            },
            None => {
                if order.has_premium_items() {
                    return Err(PaymentGatewayError::validation(
                        "couponCode",
                        "orders containing premium items require a coupon code",
                    ));
                }
            },
        }
        Ok(())
    }

    /// Changes the status of an order, rejecting transitions that are not in the
    /// [`OrderStatusType::allowed_next`] table (e.g. `delivered → payment_pending`). When `expected_version` is
    /// supplied, a concurrent modification since that version fails with `Conflict` instead of silently
    /// overwriting.
    pub async fn update_order_status(
        &self,
        order_id: i64,
        new_status: OrderStatusType,
        expected_version: Option<i64>,
    ) -> Result<Order, PaymentGatewayError> {
        self.db.update_order_status(order_id, new_status, expected_version).await
    }

    /// Attaches a buyer-submitted payment proof and moves the order into the admin review queue.
    pub async fn submit_payment_proof(&self, order_id: i64, proof_url: &str) -> Result<Order, PaymentGatewayError> {
        let order = self.db.attach_payment_proof(order_id, proof_url).await?;
        info!("🛒️ Order {} is awaiting payment review", order.order_number);
        Ok(order)
    }

    /// Applies an admin verify/reject decision. See
    /// [`PaymentGatewayDatabase::record_admin_decision`] for the exact semantics; notably, verification reserves
    /// stock atomically and rejection returns the order to `payment_pending` with the proof retained for audit.
    pub async fn record_admin_decision(
        &self,
        order_id: i64,
        admin: &str,
        decision: AdminDecision,
    ) -> Result<Order, PaymentGatewayError> {
        self.db.record_admin_decision(order_id, admin, decision).await
    }

    /// Records a remote payment intent created at the gateway, together with the (already validated) details
    /// payload and its verification deadline.
    pub async fn record_payment_intent(
        &self,
        intent_id: &str,
        amount: Paise,
        currency: &str,
        order_type: OrderType,
        user_id: i64,
        details: Option<String>,
        expires_at: DateTime<Utc>,
    ) -> Result<PaymentIntent, PaymentGatewayError> {
        let intent = NewPaymentIntent {
            intent_id: intent_id.to_string(),
            amount,
            currency: currency.to_string(),
            order_type,
            user_id,
            details,
            expires_at,
        };
        self.db.insert_payment_intent(intent).await
    }

    /// Applies a gateway confirmation idempotently. Signature verification is the caller's job — by the time this
    /// method runs, the confirmation is trusted.
    pub async fn confirm_gateway_payment(
        &self,
        intent_id: &str,
        payment_id: &str,
        fallback_order: Option<NewOrder>,
    ) -> Result<GatewayConfirmation, PaymentGatewayError> {
        if let Some(draft) = &fallback_order {
            self.validate_new_order(draft).await?;
        }
        let confirmation = self.db.confirm_gateway_payment(intent_id, payment_id, fallback_order).await?;
        match &confirmation {
            GatewayConfirmation::Applied { .. } => {
                debug!("💳️ Confirmation for intent {intent_id} applied (payment {payment_id})")
            },
            GatewayConfirmation::AlreadyProcessed => {
                debug!("💳️ Duplicate confirmation for intent {intent_id} absorbed")
            },
        }
        Ok(confirmation)
    }

    /// Marks an intent as failed after a `payment.failed` notification. No ledger or stock effect.
    pub async fn record_payment_failure(&self, intent_id: &str, payment_id: &str) -> Result<(), PaymentGatewayError> {
        warn!("💳️ Payment {payment_id} for intent {intent_id} failed at the gateway");
        self.db.mark_intent_failed(intent_id).await
    }

    pub async fn fetch_payment_intent(&self, intent_id: &str) -> Result<Option<PaymentIntent>, PaymentGatewayError> {
        self.db.fetch_payment_intent(intent_id).await
    }

    pub async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, PaymentGatewayError> {
        self.db.fetch_order_by_id(order_id).await
    }

    pub async fn fetch_order_by_number(&self, number: &OrderNumber) -> Result<Option<Order>, PaymentGatewayError> {
        self.db.fetch_order_by_number(number).await
    }

    pub async fn fetch_orders_for_user(&self, user_id: i64) -> Result<Vec<Order>, PaymentGatewayError> {
        self.db.fetch_orders_for_user(user_id).await
    }

    /// Unscoped ledger search. Admin surfaces only; agents go through
    /// [`AgentApi::orders_visible_to`](crate::bpe_api::AgentApi::orders_visible_to).
    pub async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, PaymentGatewayError> {
        self.db.search_orders(query).await
    }
}
