//! Campus Eats Order Engine
//!
//! The core library behind the Campus Eats food-ordering service. It owns the order lifecycle state machine, the
//! payment settlement flow and the reconciliation sweeps. It is HTTP-agnostic; the server crate drives it.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@sqlite`] and the contracts in [`mod@traits`]). SQLite is the only backend today, but nothing
//!    outside the `sqlite` module assumes it. You should never need to access the database directly; use the
//!    public API instead. The exception is the data types used in the database, which are defined in the
//!    [`mod@db_types`] module and are public.
//! 2. The public API ([`OrderFlowApi`]). Cart pricing, payment settlement, vendor/rider transitions and the
//!    reconciliation sweeps, all validated against the state machine in [`mod@state`].
//! 3. Events ([`mod@events`]). A simple actor framework emits typed events when orders change, so the server can
//!    hook in live notifications without the engine knowing anything about connections or rooms.
mod ce_api;

pub mod db_types;
pub mod events;
pub mod order_objects;
pub mod state;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use ce_api::order_flow_api::OrderFlowApi;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
