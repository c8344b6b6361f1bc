//! HTTP adapters - REST surface of the gateway.

pub mod gateway;

pub use gateway::{gateway_router, GatewayAppState};
