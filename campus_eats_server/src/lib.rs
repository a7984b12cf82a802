//! # Campus Eats server
//! This module hosts the HTTP server for the Campus Eats backend. It is responsible for:
//! Authenticating students, vendor staff and riders and scoping what each may do.
//! Taking carts through checkout against the payment provider and settling payments from either the client
//! callback or the provider webhook.
//! Fanning out live order events to role-scoped rooms over server-sent events.
//! Running the reconciliation jobs that cancel stale orders and purge abandoned ones.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: The authenticated student, vendor and rider APIs, plus the live event stream.
//! * `/webhook/payments`: The payment provider's webhook, authenticated by its body signature.

pub mod auth;
pub mod broadcaster;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod gateway;
pub mod helpers;
pub mod middleware;
pub mod payment_routes;
pub mod routes;
pub mod server;
pub mod workers;

#[cfg(test)]
mod endpoint_tests;
