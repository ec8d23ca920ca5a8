//! Integration with the hosted UPI payment gateway.
//!
//! Three things live here:
//! * [`GatewayApi`] — the outbound REST client that creates remote payment intents;
//! * the signature scheme — HMAC-SHA256 helpers for verifying synchronous payment confirmations
//!   (`intent_id|payment_id`) and raw webhook bodies, see [`mod@helpers`];
//! * the wire objects the gateway sends and receives, see [`mod@data_objects`].

mod api;
mod config;
mod error;

pub mod data_objects;
pub mod helpers;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use error::GatewayApiError;
