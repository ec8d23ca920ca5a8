//! The public engine API.
//!
//! These are the objects the server (and any other frontend) talks to. Each API struct wraps a storage backend
//! generically, validates inputs, logs the interesting transitions, and delegates the transactional work to the
//! backend traits.

pub mod agent_api;
pub mod membership_api;
pub mod order_flow_api;

pub use agent_api::AgentApi;
pub use membership_api::MembershipApi;
pub use order_flow_api::OrderFlowApi;
