//! Boutique Payment Engine
//!
//! The core of the storefront's order & payment reconciliation: the order ledger and its status state machine,
//! overselling-safe stock decrements, gateway payment confirmation (synchronous and webhook-delivered,
//! deduplicated), the manual proof-of-payment review workflow, coupon-scoped agent order visibility, and premium
//! membership grants.
//!
//! The library is divided into three layers:
//! 1. Database management and control ([`mod@sqlite`]). SQLite is the supported backend. You should never need to
//!    access the database directly; use the public API instead. The exception is the data types used in the
//!    database, which are defined in [`mod@db_types`] and are public.
//! 2. The storage traits ([`mod@traits`]). A backend implements these to power the engine; the API layer and the
//!    HTTP server stay generic over them, which is also what makes the endpoint tests mockable.
//! 3. The public API ([`mod@bpe_api`]): [`OrderFlowApi`], [`MembershipApi`] and [`AgentApi`].

pub mod bpe_api;
pub mod db_types;
pub mod helpers;
pub mod order_objects;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use bpe_api::{AgentApi, MembershipApi, OrderFlowApi};
pub use traits::{
    AgentAccess,
    GatewayConfirmation,
    InventoryManagement,
    MembershipManagement,
    OrderManagement,
    PaymentGatewayDatabase,
    PaymentGatewayError,
};
