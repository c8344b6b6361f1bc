//! BillingPlatform port - the billing platform's payment API.

use async_trait::async_trait;

use crate::domain::billing::{Account, CallContext, Payment};
use crate::domain::foundation::{DomainError, KbAccountId, KbPaymentId, KbTransactionId};

#[async_trait]
pub trait BillingPlatform: Send + Sync {
    /// Fetches a payment together with its transactions.
    ///
    /// A missing payment is an `ErrorCode::NotFound` error.
    async fn get_payment(
        &self,
        kb_payment_id: &KbPaymentId,
        context: &CallContext,
    ) -> Result<Payment, DomainError>;

    async fn get_account(
        &self,
        kb_account_id: &KbAccountId,
        context: &CallContext,
    ) -> Result<Account, DomainError>;

    /// Settles a pending transaction as succeeded or failed.
    async fn notify_pending_transaction_state_changed(
        &self,
        account: &Account,
        kb_transaction_id: &KbTransactionId,
        is_success: bool,
        context: &CallContext,
    ) -> Result<Payment, DomainError>;
}
