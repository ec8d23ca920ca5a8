//! Storage-backend traits for the payment engine.
//!
//! Each trait captures one capability of a backend: reading the order ledger, driving the payment flows, mutating
//! stock, managing memberships, and resolving agent/coupon scope. A concrete backend (currently SQLite, see
//! [`crate::sqlite`]) implements all of them; API structs and HTTP handlers stay generic so they can be exercised
//! against mocks in tests.

mod agent_access;
mod data_objects;
mod inventory_management;
mod membership_management;
mod order_management;
mod payment_gateway_database;

pub use agent_access::AgentAccess;
pub use data_objects::GatewayConfirmation;
pub use inventory_management::InventoryManagement;
pub use membership_management::MembershipManagement;
pub use order_management::OrderManagement;
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
