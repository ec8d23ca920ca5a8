//! Core data types shared between the storage layer and the public engine API.
//!
//! Everything in here maps 1:1 onto a database row (or a fragment of one). The types are deliberately dumb: the
//! interesting behaviour (validation, transition rules, idempotency) lives in the [`crate::bpe_api`] layer and the
//! SQLite backend.

use std::{fmt::Display, str::FromStr};

use bps_common::Paise;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------     OrderNumber     ---------------------------------------------------------
/// The human-readable order reference (`ORD-nnnnnn-XXXXX`) printed on invoices and quoted by customers.
/// Unique across the ledger; the internal integer id stays server-side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderNumber(pub String);

impl OrderNumber {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrderNumber {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderNumber {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   OrderStatusType   ---------------------------------------------------------
/// The order lifecycle. Wire values are the snake_case strings, e.g. `payment_pending`.
///
/// The happy paths through the machine are
/// `PaymentPending → Pending → PaymentVerified → Processing → Shipped → Delivered` for the manual-proof flow, and
/// `PaymentPending → PaymentVerified → …` when the gateway confirms synchronously. `Cancelled` is reachable from
/// every non-terminal state. An admin rejection moves `Pending` back to `PaymentPending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Newly created. No payment confirmation of any kind has been received.
    PaymentPending,
    /// A payment proof has been submitted and is awaiting admin review.
    Pending,
    /// Payment is confirmed, either by the gateway or by an explicit admin decision.
    PaymentVerified,
    /// The order is being prepared for shipment.
    Processing,
    /// The order has been handed to the courier.
    Shipped,
    /// Terminal. The order reached the customer.
    Delivered,
    /// Terminal. Cancelled by the buyer or an admin.
    Cancelled,
}

impl OrderStatusType {
    /// The set of states this state may legally transition to. Anything not in the returned slice is rejected by
    /// [`update_order_status`](crate::traits::PaymentGatewayDatabase::update_order_status).
    pub fn allowed_next(self) -> &'static [OrderStatusType] {
        use OrderStatusType::*;
        match self {
            PaymentPending => &[Pending, PaymentVerified, Cancelled],
            Pending => &[PaymentVerified, PaymentPending, Cancelled],
            PaymentVerified => &[Processing, Cancelled],
            Processing => &[Shipped, Cancelled],
            Shipped => &[Delivered, Cancelled],
            Delivered => &[],
            Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: OrderStatusType) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_next().is_empty()
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatusType::PaymentPending => "payment_pending",
            OrderStatusType::Pending => "pending",
            OrderStatusType::PaymentVerified => "payment_verified",
            OrderStatusType::Processing => "processing",
            OrderStatusType::Shipped => "shipped",
            OrderStatusType::Delivered => "delivered",
            OrderStatusType::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_pending" => Ok(Self::PaymentPending),
            "pending" => Ok(Self::Pending),
            "payment_verified" => Ok(Self::PaymentVerified),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Manual UPI transfer. The buyer pays out-of-band and uploads a proof screenshot for admin review.
    UpiQr,
    /// The hosted payment gateway. Confirmations carry an HMAC signature.
    Gateway,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::UpiQr => write!(f, "upi_qr"),
            PaymentMethod::Gateway => write!(f, "gateway"),
        }
    }
}

//--------------------------------------   ShippingAddress   ---------------------------------------------------------
/// A point-in-time snapshot of the delivery address. Orders never read the buyer profile after creation; the
/// address travels with the order.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Returns the name of the first blank field, if any. Every field is required on every order.
    pub fn first_blank_field(&self) -> Option<&'static str> {
        [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("zipCode", &self.zip_code),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
    }
}

//--------------------------------------      OrderItem      ---------------------------------------------------------
/// A line item, snapshotted (name/brand/price/image) at the moment the order was placed so later catalog edits
/// don't rewrite order history.
#[derive(Debug, Clone, PartialEq, Eq, Default, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: i64,
    pub name: String,
    pub brand: String,
    pub price: Paise,
    pub quantity: i64,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub is_premium: bool,
}

impl OrderItem {
    pub fn line_total(&self) -> Paise {
        self.price * self.quantity
    }
}

//--------------------------------------        Order        ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_number: OrderNumber,
    pub user_id: i64,
    #[sqlx(skip)]
    pub items: Vec<OrderItem>,
    pub subtotal: Paise,
    pub shipping: Paise,
    pub tax: Paise,
    pub total: Paise,
    pub status: OrderStatusType,
    pub payment_method: PaymentMethod,
    pub payment_id: Option<String>,
    pub gateway_intent_id: Option<String>,
    pub payment_proof: Option<String>,
    pub payment_verified: bool,
    pub verified_by: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
    pub coupon_code: Option<String>,
    #[sqlx(flatten)]
    #[serde(rename = "shippingAddress")]
    pub shipping_address: ShippingAddress,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_captured_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// `true` iff the arithmetic invariant `total == subtotal + shipping + tax` holds.
    pub fn totals_are_consistent(&self) -> bool {
        self.subtotal + self.shipping + self.tax == self.total
    }
}

//--------------------------------------      NewOrder       ---------------------------------------------------------
/// The payload for creating a ledger entry. Validated by
/// [`OrderFlowApi::create_order`](crate::bpe_api::OrderFlowApi::create_order) before it touches the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub user_id: i64,
    pub items: Vec<OrderItem>,
    pub subtotal: Paise,
    pub shipping: Paise,
    pub tax: Paise,
    pub total: Paise,
    pub shipping_address: ShippingAddress,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
    #[serde(default)]
    pub location: Option<OrderLocation>,
}

impl NewOrder {
    pub fn new(user_id: i64, items: Vec<OrderItem>, shipping: Paise, tax: Paise, address: ShippingAddress) -> Self {
        let subtotal = items.iter().map(OrderItem::line_total).sum::<Paise>();
        let total = subtotal + shipping + tax;
        Self {
            user_id,
            items,
            subtotal,
            shipping,
            tax,
            total,
            shipping_address: address,
            coupon_code: None,
            payment_method: None,
            location: None,
        }
    }

    pub fn with_coupon<S: Into<String>>(mut self, code: S) -> Self {
        self.coupon_code = Some(code.into());
        self
    }

    pub fn with_location(mut self, location: OrderLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn has_premium_items(&self) -> bool {
        self.items.iter().any(|i| i.is_premium)
    }
}

/// The geolocation captured at checkout, if the buyer's device supplied one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLocation {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub accuracy: Option<f64>,
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
}

//--------------------------------------       Product       ---------------------------------------------------------
/// Catalog metadata is owned elsewhere; this engine only ever writes `stock_quantity` / `in_stock`, and only
/// through the atomic decrement in the stock reconciler.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub brand: String,
    pub price: Paise,
    pub stock_quantity: i64,
    pub in_stock: bool,
    pub is_premium: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        User         ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_premium: bool,
    pub membership_expiry: Option<DateTime<Utc>>,
    #[sqlx(flatten)]
    #[serde(rename = "address")]
    pub address: ShippingAddress,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Premium membership is derived, never stored: the flag must be set *and* the expiry must be in the future.
    pub fn has_active_membership(&self, now: DateTime<Utc>) -> bool {
        self.is_premium && self.membership_expiry.map(|e| e > now).unwrap_or(false)
    }
}

//--------------------------------------    Agent & Coupon   ---------------------------------------------------------
/// A delegated sales agent. Each agent owns exactly one coupon code, and their order visibility is partitioned to
/// orders carrying that code.
#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: i64,
    pub username: String,
    pub name: String,
    pub coupon_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAgent {
    pub username: String,
    pub name: String,
    pub coupon_code: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: i64,
    pub code: String,
    pub agent_id: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------    PaymentIntent    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Product,
    Membership,
}

impl Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderType::Product => write!(f, "product"),
            OrderType::Membership => write!(f, "membership"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    Created,
    Confirmed,
    Failed,
}

/// A remote payment intent, recorded when the gateway order is created. The `details` payload captures the order
/// draft (or membership parameters) at intent time, so the webhook path can materialise a ledger entry even when it
/// arrives before — or instead of — the synchronous confirmation.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub amount: Paise,
    pub currency: String,
    pub order_type: OrderType,
    pub user_id: i64,
    pub details: Option<String>,
    pub status: IntentStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Parses the stored details payload as membership parameters. Membership intents are required to carry these
    /// from creation time.
    pub fn membership_params(&self) -> Result<MembershipParams, serde_json::Error> {
        let json = self.details.as_deref().unwrap_or("{}");
        serde_json::from_str(json)
    }
}

/// The parameters of a membership purchase, captured in the intent's details payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipParams {
    pub duration_months: u32,
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub intent_id: String,
    pub amount: Paise,
    pub currency: String,
    pub order_type: OrderType,
    pub user_id: i64,
    pub details: Option<String>,
    pub expires_at: DateTime<Utc>,
}

//--------------------------------------        Role         ---------------------------------------------------------
/// Authorisation roles carried in access-token claims. The server's ACL middleware matches these against each
/// route's requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A regular buyer. May create orders and see their own.
    User,
    /// A delegated agent. May only see orders carrying their own coupon code.
    Agent,
    /// A storefront administrator. May list all orders, change statuses, and verify or reject payments.
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "agent" => Ok(Self::Agent),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

/// An admin's decision on a manually-submitted payment proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminDecision {
    Verify,
    Reject,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transition_table_matches_lifecycle() {
        use OrderStatusType::*;
        assert!(PaymentPending.can_transition_to(Pending));
        assert!(PaymentPending.can_transition_to(PaymentVerified));
        assert!(Pending.can_transition_to(PaymentPending)); // admin rejection
        assert!(Shipped.can_transition_to(Delivered));
        assert!(!Delivered.can_transition_to(PaymentPending));
        assert!(!PaymentVerified.can_transition_to(Pending));
        assert!(!Cancelled.can_transition_to(PaymentPending));
        assert!(Delivered.is_terminal());
        assert!(Cancelled.is_terminal());
        // Cancellation is reachable from every non-terminal state
        for status in [PaymentPending, Pending, PaymentVerified, Processing, Shipped] {
            assert!(status.can_transition_to(Cancelled), "{status} should allow cancellation");
        }
    }

    #[test]
    fn status_round_trips_through_wire_values() {
        for status in [
            OrderStatusType::PaymentPending,
            OrderStatusType::Pending,
            OrderStatusType::PaymentVerified,
            OrderStatusType::Processing,
            OrderStatusType::Shipped,
            OrderStatusType::Delivered,
            OrderStatusType::Cancelled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert!("confirmed".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn blank_address_fields_are_reported() {
        let mut address = ShippingAddress {
            street: "14 Marine Drive".into(),
            city: "Mumbai".into(),
            state: "MH".into(),
            zip_code: "400001".into(),
            country: "India".into(),
        };
        assert_eq!(address.first_blank_field(), None);
        address.zip_code = "   ".into();
        assert_eq!(address.first_blank_field(), Some("zipCode"));
    }

    #[test]
    fn new_order_derives_totals_from_items() {
        let items = vec![OrderItem {
            product_id: 1,
            name: "No. 5 Eau de Parfum".into(),
            brand: "Chanel".into(),
            price: Paise::from(1000),
            quantity: 2,
            image: String::new(),
            is_premium: false,
        }];
        let address = ShippingAddress {
            street: "a".into(),
            city: "b".into(),
            state: "c".into(),
            zip_code: "d".into(),
            country: "e".into(),
        };
        let order = NewOrder::new(7, items, Paise::from(100), Paise::from(180), address);
        assert_eq!(order.subtotal, Paise::from(2000));
        assert_eq!(order.total, Paise::from(2280));
    }
}
