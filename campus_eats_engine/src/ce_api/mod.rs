//! The engine's public API surface. HTTP handlers and workers call through [`order_flow_api::OrderFlowApi`];
//! nothing outside the engine touches the storage traits directly.
pub mod order_flow_api;
