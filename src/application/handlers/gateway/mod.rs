//! Gateway handlers.
//!
//! - `TokenGuard` - valid bearer credential per tenant, serialized refresh
//! - `TransferExecutor` - purchases and refunds against the processor
//! - `NotificationReconciler` - webhook deduplication and billing settlement
//! - `PaymentPluginApi` - the host-facing plugin surface

mod notification_reconciler;
mod payment_plugin;
mod token_guard;
mod transfer_executor;

pub use notification_reconciler::{NotificationReconciler, ProcessNotificationCommand};
pub use payment_plugin::{FormDescriptor, PaymentPluginApi, PaymentRequest};
pub use token_guard::TokenGuard;
pub use transfer_executor::{MerchantFundingSourcePolicy, TransferExecution, TransferExecutor};
