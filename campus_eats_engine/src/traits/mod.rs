//! Interface contracts for order-flow storage backends.
//!
//! The engine never talks to a database directly. Everything goes through these traits, so that the order flow
//! API, the reconciliation jobs and the server endpoints can be tested against mocks, and the sqlite backend can
//! be swapped for another store without touching the business rules.
//!
//! * [`PaymentGatewayDatabase`] carries the mutating order-flow operations: order insertion, payment settlement,
//!   lifecycle transitions, rider claims and the reconciliation sweeps.
//! * [`OrderManagement`] carries the read-side queries used by the role APIs.
mod order_management;
mod payment_gateway_database;

pub use order_management::OrderManagement;
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
