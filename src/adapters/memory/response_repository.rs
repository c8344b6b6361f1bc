//! In-memory response ledger.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{
    DomainError, ErrorCode, KbPaymentId, KbPaymentMethodId, TenantId, Timestamp,
};
use crate::domain::gateway::{
    RejectionDetail, ResponseEntry, TransactionAttempt, TransferRecord, TransferStatus,
};
use crate::ports::ResponseRepository;

#[derive(Default)]
pub struct InMemoryResponseRepository {
    entries: RwLock<Vec<ResponseEntry>>,
    fail_next: AtomicBool,
}

impl InMemoryResponseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `record_*` call fail with a database error.
    pub fn fail_next_write(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts the entry, or merges it into the attempt's existing row.
    ///
    /// A failure leaves a row that already references a transfer untouched.
    fn upsert(&self, entry: ResponseEntry) -> Result<ResponseEntry, DomainError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DomainError::database("Simulated write failure"));
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let existing = entries.iter_mut().find(|e| {
            e.kb_transaction_id == entry.kb_transaction_id && e.tenant_id == entry.tenant_id
        });

        match existing {
            Some(row) => {
                if entry.transfer_id.is_some() {
                    row.transfer_id = entry.transfer_id;
                    row.transfer_status = entry.transfer_status;
                    row.transfer_snapshot = entry.transfer_snapshot;
                    row.failure = entry.failure;
                    row.error_code = entry.error_code;
                    row.error_message = entry.error_message;
                } else if row.transfer_id.is_none() {
                    row.error_code = entry.error_code;
                    row.error_message = entry.error_message;
                }
                Ok(row.clone())
            }
            None => {
                entries.push(entry.clone());
                Ok(entry)
            }
        }
    }

    fn select<F>(&self, predicate: F) -> Vec<ResponseEntry>
    where
        F: Fn(&ResponseEntry) -> bool,
    {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResponseRepository for InMemoryResponseRepository {
    async fn record_success(
        &self,
        attempt: &TransactionAttempt,
        transfer: &TransferRecord,
        now: Timestamp,
    ) -> Result<ResponseEntry, DomainError> {
        self.upsert(ResponseEntry::success(attempt, transfer, now))
    }

    async fn record_failure(
        &self,
        attempt: &TransactionAttempt,
        rejection: &RejectionDetail,
        now: Timestamp,
    ) -> Result<ResponseEntry, DomainError> {
        self.upsert(ResponseEntry::failure(attempt, rejection, now))
    }

    async fn find_by_payment_method(
        &self,
        kb_payment_method_id: &KbPaymentMethodId,
        tenant_id: &TenantId,
    ) -> Result<Vec<ResponseEntry>, DomainError> {
        Ok(self.select(|e| &e.kb_payment_method_id == kb_payment_method_id && &e.tenant_id == tenant_id))
    }

    async fn find_by_payment_id(
        &self,
        kb_payment_id: &KbPaymentId,
        tenant_id: &TenantId,
    ) -> Result<Vec<ResponseEntry>, DomainError> {
        Ok(self.select(|e| &e.kb_payment_id == kb_payment_id && &e.tenant_id == tenant_id))
    }

    async fn find_by_transfer_id(
        &self,
        transfer_id: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ResponseEntry>, DomainError> {
        let mut matches =
            self.select(|e| e.transfer_id.as_deref() == Some(transfer_id) && &e.tenant_id == tenant_id);
        if matches.len() > 1 {
            return Err(DomainError::new(
                ErrorCode::IntegrityViolation,
                format!("{} ledger entries reference transfer {}", matches.len(), transfer_id),
            ));
        }
        Ok(matches.pop())
    }

    async fn update_status(
        &self,
        transfer_id: &str,
        status: &TransferStatus,
        tenant_id: &TenantId,
    ) -> Result<(), DomainError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        for entry in entries
            .iter_mut()
            .filter(|e| e.transfer_id.as_deref() == Some(transfer_id) && &e.tenant_id == tenant_id)
        {
            entry.transfer_status = Some(status.clone());
        }
        Ok(())
    }
}
