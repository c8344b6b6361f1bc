//! In-memory adapters for tests and local runs.
//!
//! Every store keeps the uniqueness and tenant-scoping rules of its
//! PostgreSQL counterpart, so handler tests exercise the same contracts.
//! State is lost on restart; not for production use.

mod billing_platform;
mod notification_repository;
mod payment_method_repository;
mod response_repository;
mod token_repository;

pub use billing_platform::InMemoryBillingPlatform;
pub use notification_repository::InMemoryNotificationRepository;
pub use payment_method_repository::InMemoryPaymentMethodRepository;
pub use response_repository::InMemoryResponseRepository;
pub use token_repository::InMemoryTokenRepository;
