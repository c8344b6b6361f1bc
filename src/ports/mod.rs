//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the gateway core and the outside world. Adapters implement these ports.
//!
//! ## Remote Ports
//!
//! - `TransferApi` - The payment processor's API (transfers, funding sources, OAuth)
//! - `BillingPlatform` - Payment lookup and pending-transaction settlement
//!
//! ## Storage Ports
//!
//! - `TokenRepository` - Per-tenant OAuth token pair
//! - `PaymentMethodRepository` - Payment method to funding source mapping
//! - `ResponseRepository` - The response ledger
//! - `NotificationRepository` - Webhook idempotency tracking

mod billing_platform;
mod notification_repository;
mod payment_method_repository;
mod response_repository;
mod token_repository;
mod transfer_api;

pub use billing_platform::BillingPlatform;
pub use notification_repository::{NotificationRepository, SaveResult};
pub use payment_method_repository::PaymentMethodRepository;
pub use response_repository::ResponseRepository;
pub use token_repository::TokenRepository;
pub use transfer_api::{
    ProviderError, ProviderErrorKind, TransferApi, EXPIRED_ACCESS_TOKEN, INVALID_ACCESS_TOKEN,
};
