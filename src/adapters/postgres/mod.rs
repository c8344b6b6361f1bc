//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresTokenRepository` - per-tenant OAuth token pairs
//! - `PostgresPaymentMethodRepository` - payment method to funding source links
//! - `PostgresResponseRepository` - the response ledger
//! - `PostgresNotificationRepository` - received webhooks, unique per tenant
//!
//! Schema lives in `migrations/`.

mod notification_repository;
mod payment_method_repository;
mod response_repository;
mod token_repository;

pub use notification_repository::PostgresNotificationRepository;
pub use payment_method_repository::PostgresPaymentMethodRepository;
pub use response_repository::PostgresResponseRepository;
pub use token_repository::PostgresTokenRepository;
