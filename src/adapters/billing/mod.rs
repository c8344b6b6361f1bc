//! Billing platform adapter.
//!
//! Implements the `BillingPlatform` port against the Kill Bill REST API.

mod http_platform;

pub use http_platform::{BillingClientConfig, HttpBillingPlatform};
