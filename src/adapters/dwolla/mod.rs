//! Dwolla adapter.
//!
//! Implements the `TransferApi` port against the Dwolla v2 REST API:
//! - API root probe and account discovery
//! - Transfer creation with idempotency keys
//! - Funding source lookup and listing
//! - OAuth refresh grant
//! - Webhook signature verification
//!
//! # Security
//!
//! - Bearer credentials are passed per call and never stored here
//! - Webhook signatures use HMAC-SHA256 with constant-time comparison
//! - All secrets are handled via `secrecy::SecretString`
//!
//! # Configuration
//!
//! Required environment variables:
//! - `DWOLLA_GATEWAY__DWOLLA__CLIENT_ID`
//! - `DWOLLA_GATEWAY__DWOLLA__CLIENT_SECRET`

mod api_types;
mod client;
mod mock_transfer_api;
mod webhook_signature;

pub use api_types::{transfer_json, CreateTransferBody, TransferResource};
pub use client::{DwollaClientConfig, DwollaTransferApi, HAL_JSON};
pub use mock_transfer_api::MockTransferApi;
pub use webhook_signature::{SignatureError, WebhookSignatureVerifier, SIGNATURE_HEADER};
