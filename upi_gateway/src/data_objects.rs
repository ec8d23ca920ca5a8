//! Wire objects exchanged with the hosted gateway.

use bps_common::Paise;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The request body for creating a remote payment intent. Amounts are minor units (paise).
#[derive(Debug, Clone, Serialize)]
pub struct RemoteIntentRequest {
    pub amount: i64,
    pub currency: String,
    pub receipt: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub notes: Value,
}

impl RemoteIntentRequest {
    pub fn new(amount: Paise, currency: &str, receipt: &str, notes: Value) -> Self {
        Self { amount: amount.value(), currency: currency.to_string(), receipt: receipt.to_string(), notes }
    }
}

/// The gateway's representation of a created intent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteIntent {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub receipt: Option<String>,
    pub status: String,
}

/// An asynchronous event notification. The gateway retries delivery until it receives a 2xx, so the same event may
/// arrive multiple times; handlers must be idempotent.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment: Option<WebhookEntityWrapper>,
    #[serde(default)]
    pub order: Option<WebhookEntityWrapper>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEntityWrapper {
    pub entity: PaymentEntity,
}

/// The payment entity embedded in `payment.*` / `order.*` events. `order_id` is the remote intent id.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl WebhookEvent {
    /// Pulls the `(intent_id, payment_id)` pair out of whichever entity this event carries.
    /// `order.paid` events carry the intent id as the entity's own id.
    pub fn confirmation_ids(&self) -> Option<(String, String)> {
        if let Some(payment) = &self.payload.payment {
            let intent = payment.entity.order_id.clone()?;
            return Some((intent, payment.entity.id.clone()));
        }
        if let Some(order) = &self.payload.order {
            let payment = order.entity.order_id.clone().unwrap_or_else(|| order.entity.id.clone());
            return Some((order.entity.id.clone(), payment));
        }
        None
    }
}
