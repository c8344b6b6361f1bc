//! ResponseRepository port - the response ledger.
//!
//! One row per transaction attempt, success or failure, keyed by
//! `(kb_transaction_id, tenant_id)`. Recording the same attempt again updates
//! that row instead of adding one. Webhooks only update the transfer status.
//! Nothing in the gateway deletes ledger rows.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, KbPaymentId, KbPaymentMethodId, TenantId, Timestamp};
use crate::domain::gateway::{
    RejectionDetail, ResponseEntry, TransactionAttempt, TransferRecord, TransferStatus,
};

#[async_trait]
pub trait ResponseRepository: Send + Sync {
    /// Records a transfer the processor accepted, replacing any earlier
    /// failure recorded for the same attempt.
    async fn record_success(
        &self,
        attempt: &TransactionAttempt,
        transfer: &TransferRecord,
        now: Timestamp,
    ) -> Result<ResponseEntry, DomainError>;

    /// Records an attempt that produced no transfer.
    ///
    /// If the attempt's row already references a transfer, that row is
    /// returned unchanged.
    async fn record_failure(
        &self,
        attempt: &TransactionAttempt,
        rejection: &RejectionDetail,
        now: Timestamp,
    ) -> Result<ResponseEntry, DomainError>;

    /// Entries recorded against a payment method, newest first.
    async fn find_by_payment_method(
        &self,
        kb_payment_method_id: &KbPaymentMethodId,
        tenant_id: &TenantId,
    ) -> Result<Vec<ResponseEntry>, DomainError>;

    /// Entries of a payment, oldest first.
    async fn find_by_payment_id(
        &self,
        kb_payment_id: &KbPaymentId,
        tenant_id: &TenantId,
    ) -> Result<Vec<ResponseEntry>, DomainError>;

    /// The entry owning a transfer.
    ///
    /// More than one matching row is reported as an
    /// `ErrorCode::IntegrityViolation`.
    async fn find_by_transfer_id(
        &self,
        transfer_id: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ResponseEntry>, DomainError>;

    /// Updates the mirrored transfer status of the entry owning a transfer.
    async fn update_status(
        &self,
        transfer_id: &str,
        status: &TransferStatus,
        tenant_id: &TenantId,
    ) -> Result<(), DomainError>;
}
