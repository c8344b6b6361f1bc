//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the gateway core to external systems:
//! - `dwolla` - Dwolla REST API, webhook signatures and a test double
//! - `billing` - Kill Bill REST API
//! - `postgres` - Durable stores for tokens, payment methods, responses and notifications
//! - `memory` - In-memory stores for tests and local runs
//! - `http` - Axum endpoints for the billing host and Dwolla webhooks

pub mod billing;
pub mod dwolla;
pub mod http;
pub mod memory;
pub mod postgres;
