//! In-memory billing platform.
//!
//! Holds payments and accounts and enforces the platform's transaction
//! state machine, so only PENDING transactions can be settled.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::billing::{
    Account, CallContext, Payment, PaymentTransaction, TransactionStatus,
};
use crate::domain::foundation::{
    DomainError, ErrorCode, KbAccountId, KbPaymentId, KbTransactionId, StateMachine,
};
use crate::domain::gateway::TransactionAttempt;
use crate::ports::BillingPlatform;

#[derive(Default)]
struct PlatformState {
    payments: HashMap<KbPaymentId, Payment>,
    accounts: HashMap<KbAccountId, Account>,
    transitions: usize,
}

#[derive(Default)]
pub struct InMemoryBillingPlatform {
    state: Mutex<PlatformState>,
}

impl InMemoryBillingPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers the transaction of an attempt, creating its payment and account as needed.
    pub fn add_transaction(&self, attempt: &TransactionAttempt, status: TransactionStatus) {
        let mut state = self.state();
        state
            .accounts
            .entry(attempt.kb_account_id)
            .or_insert_with(|| Account {
                id: attempt.kb_account_id,
                external_key: None,
            });
        let payment = state
            .payments
            .entry(attempt.kb_payment_id)
            .or_insert_with(|| Payment {
                id: attempt.kb_payment_id,
                account_id: attempt.kb_account_id,
                transactions: Vec::new(),
            });
        payment.transactions.push(PaymentTransaction {
            id: attempt.kb_transaction_id,
            transaction_type: attempt.transaction_type,
            status,
            amount: Some(attempt.amount.value),
            currency: Some(attempt.amount.currency.clone()),
        });
    }

    pub fn status_of(&self, kb_transaction_id: &KbTransactionId) -> Option<TransactionStatus> {
        self.state()
            .payments
            .values()
            .find_map(|p| p.find_transaction(kb_transaction_id))
            .map(|t| t.status)
    }

    /// Number of accepted pending-transaction transitions.
    pub fn transition_count(&self) -> usize {
        self.state().transitions
    }

    pub fn reassign_payment(&self, kb_payment_id: &KbPaymentId, account_id: KbAccountId) {
        if let Some(payment) = self.state().payments.get_mut(kb_payment_id) {
            payment.account_id = account_id;
        }
    }

    pub fn remove_payment(&self, kb_payment_id: &KbPaymentId) {
        self.state().payments.remove(kb_payment_id);
    }
}

#[async_trait]
impl BillingPlatform for InMemoryBillingPlatform {
    async fn get_payment(
        &self,
        kb_payment_id: &KbPaymentId,
        _context: &CallContext,
    ) -> Result<Payment, DomainError> {
        self.state()
            .payments
            .get(kb_payment_id)
            .cloned()
            .ok_or_else(|| DomainError::new(ErrorCode::NotFound, format!("Payment {} not found", kb_payment_id)))
    }

    async fn get_account(
        &self,
        kb_account_id: &KbAccountId,
        _context: &CallContext,
    ) -> Result<Account, DomainError> {
        self.state()
            .accounts
            .get(kb_account_id)
            .cloned()
            .ok_or_else(|| DomainError::new(ErrorCode::NotFound, format!("Account {} not found", kb_account_id)))
    }

    async fn notify_pending_transaction_state_changed(
        &self,
        account: &Account,
        kb_transaction_id: &KbTransactionId,
        is_success: bool,
        _context: &CallContext,
    ) -> Result<Payment, DomainError> {
        let mut state = self.state();
        let payment = state
            .payments
            .values_mut()
            .find(|p| p.account_id == account.id && p.find_transaction(kb_transaction_id).is_some())
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::NotFound,
                    format!("Transaction {} not found for account {}", kb_transaction_id, account.id),
                )
            })?;

        let target = if is_success {
            TransactionStatus::Success
        } else {
            TransactionStatus::PaymentFailure
        };
        for transaction in payment.transactions.iter_mut().filter(|t| &t.id == kb_transaction_id) {
            transaction.status = transaction
                .status
                .transition_to(target)
                .map_err(|e| DomainError::new(ErrorCode::ValidationFailed, e.to_string()))?;
        }
        let updated = payment.clone();
        state.transitions += 1;
        Ok(updated)
    }
}
