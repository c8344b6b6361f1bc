//! Billing platform module - the platform's view of payments.
//!
//! The billing platform owns payments, transactions and accounts. The gateway
//! reads these views and asks the platform to settle pending transactions.

mod context;
mod plugin_status;
mod transaction;

pub use context::{CallContext, PluginProperty};
pub use plugin_status::PluginStatus;
pub use transaction::{Account, Payment, PaymentTransaction, TransactionStatus, TransactionType};
