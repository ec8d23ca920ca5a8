//! Request and response DTOs for the HTTP surface. Wire casing is camelCase throughout.

use std::fmt::Display;

use bps_common::Paise;
use boutique_payment_engine::db_types::{
    AdminDecision,
    NewOrder,
    OrderItem,
    OrderLocation,
    OrderStatusType,
    OrderType,
    PaymentMethod,
    ShippingAddress,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//----------------------------------------------   Orders  -----------------------------------------------------------
/// The create-order payload. The buyer identity is *not* part of the body; it comes from the verified access-token
/// claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub items: Vec<OrderItem>,
    pub subtotal: Paise,
    pub shipping: Paise,
    pub tax: Paise,
    pub total: Paise,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub location: Option<OrderLocation>,
}

impl CreateOrderRequest {
    pub fn into_new_order(self, user_id: i64, method: PaymentMethod) -> NewOrder {
        NewOrder {
            user_id,
            items: self.items,
            subtotal: self.subtotal,
            shipping: self.shipping,
            tax: self.tax,
            total: self.total,
            shipping_address: self.shipping_address,
            coupon_code: self.coupon_code.map(|c| c.trim().to_uppercase()),
            payment_method: Some(method),
            location: self.location,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: OrderStatusType,
    /// When present, the update only applies if the order still has this version (optimistic concurrency).
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminDecisionRequest {
    pub order_id: i64,
    pub action: AdminDecision,
}

/// Admin list filters: `?verified=false` is the "awaiting approval" queue, `?verified=true` the "ready to
/// deliver" queue. Both are derived views over the ledger, not states of their own.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListQuery {
    #[serde(default)]
    pub verified: Option<bool>,
    #[serde(default)]
    pub status: Option<OrderStatusType>,
}

//----------------------------------------------   Coupons  ----------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponRequest {
    pub coupon_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCouponResponse {
    pub valid: bool,
}

//----------------------------------------------   Membership  -------------------------------------------------------
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipStatusResponse {
    pub is_premium: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_expiry: Option<DateTime<Utc>>,
}

//----------------------------------------------   Gateway  ----------------------------------------------------------
/// Correlation data for a payment intent. For product intents the full order draft rides along and is stored
/// server-side, so a webhook can materialise the ledger entry even if the buyer's browser never calls back.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentNotes {
    pub order_type: OrderType,
    #[serde(default)]
    pub duration_months: Option<u32>,
    #[serde(default)]
    pub order: Option<CreateOrderRequest>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntentRequest {
    pub amount_minor_units: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub receipt: Option<String>,
    pub notes: IntentNotes,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentResponse {
    pub intent_id: String,
    pub amount: Paise,
    pub currency: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentRequest {
    pub intent_id: String,
    pub payment_id: String,
    /// Lowercase hex HMAC-SHA256 over `"{intentId}|{paymentId}"`.
    pub signature: String,
    #[serde(default)]
    pub order_type: Option<OrderType>,
    /// Fallback order draft for intents that were created without one. The server prefers the draft stored at
    /// intent creation.
    #[serde(default)]
    pub order_details: Option<CreateOrderRequest>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub payment_id: String,
    pub intent_id: String,
    /// True when this confirmation had already been applied and the call was an idempotent no-op.
    pub already_processed: bool,
}
