//! Application handlers.
//!
//! Command handlers that orchestrate the gateway components.

pub mod gateway;
