//! Response ledger entries and the outcome returned to the billing platform.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::money::Money;
use super::transfer::{TransferFailure, TransferRecord, TransferStatus};
use crate::domain::billing::{PluginProperty, PluginStatus, TransactionType};
use crate::domain::foundation::{
    KbAccountId, KbPaymentId, KbPaymentMethodId, KbTransactionId, TenantId, Timestamp,
};

/// Everything known about a payment operation before the processor is called.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionAttempt {
    pub transaction_type: TransactionType,
    pub kb_account_id: KbAccountId,
    pub kb_payment_id: KbPaymentId,
    pub kb_transaction_id: KbTransactionId,
    pub kb_payment_method_id: KbPaymentMethodId,
    pub amount: Money,
    pub properties: Vec<PluginProperty>,
    pub tenant_id: TenantId,
}

/// Why the processor refused to create a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectionDetail {
    pub code: Option<String>,
    pub message: String,
}

/// One row of the response ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEntry {
    pub id: Uuid,
    pub tenant_id: TenantId,
    pub kb_account_id: KbAccountId,
    pub kb_payment_id: KbPaymentId,
    pub kb_transaction_id: KbTransactionId,
    pub kb_payment_method_id: KbPaymentMethodId,
    pub transaction_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub transfer_id: Option<String>,
    pub transfer_status: Option<TransferStatus>,
    pub transfer_snapshot: Option<serde_json::Value>,
    pub failure: Option<TransferFailure>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub properties: Vec<PluginProperty>,
    pub created_at: Timestamp,
}

impl ResponseEntry {
    fn from_attempt(attempt: &TransactionAttempt, created_at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: attempt.tenant_id,
            kb_account_id: attempt.kb_account_id,
            kb_payment_id: attempt.kb_payment_id,
            kb_transaction_id: attempt.kb_transaction_id,
            kb_payment_method_id: attempt.kb_payment_method_id,
            transaction_type: attempt.transaction_type,
            amount: attempt.amount.value,
            currency: attempt.amount.currency.clone(),
            transfer_id: None,
            transfer_status: None,
            transfer_snapshot: None,
            failure: None,
            error_code: None,
            error_message: None,
            properties: attempt.properties.clone(),
            created_at,
        }
    }

    /// Entry for a transfer the processor accepted.
    pub fn success(attempt: &TransactionAttempt, transfer: &TransferRecord, created_at: Timestamp) -> Self {
        Self {
            transfer_id: Some(transfer.id.clone()),
            transfer_status: Some(transfer.status.clone()),
            transfer_snapshot: Some(transfer.snapshot.clone()),
            failure: transfer.failure.clone(),
            ..Self::from_attempt(attempt, created_at)
        }
    }

    /// Entry for a transfer the processor refused to create.
    pub fn failure(attempt: &TransactionAttempt, rejection: &RejectionDetail, created_at: Timestamp) -> Self {
        Self {
            error_code: rejection.code.clone(),
            error_message: Some(rejection.message.clone()),
            ..Self::from_attempt(attempt, created_at)
        }
    }

    pub fn is_rejection(&self) -> bool {
        self.transfer_id.is_none() && (self.error_code.is_some() || self.error_message.is_some())
    }

    /// Status to report to the billing platform for this entry.
    pub fn plugin_status(&self) -> PluginStatus {
        if self.is_rejection() {
            return PluginStatus::Error;
        }
        self.transfer_status
            .as_ref()
            .map(TransferStatus::plugin_status)
            .unwrap_or(PluginStatus::Undefined)
    }
}

/// Result of a plugin payment call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutcome {
    pub kb_payment_id: KbPaymentId,
    pub kb_transaction_id: KbTransactionId,
    pub transaction_type: TransactionType,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub status: PluginStatus,
    /// Processor transfer id.
    pub first_reference_id: Option<String>,
    /// Processor transfer status at the time of the call.
    pub second_reference_id: Option<String>,
    pub gateway_error: Option<String>,
    pub gateway_error_code: Option<String>,
    pub created_date: Timestamp,
    pub effective_date: Timestamp,
    pub properties: Vec<PluginProperty>,
}

impl TransactionOutcome {
    /// Outcome for an operation the processor does not support.
    pub fn undefined(
        transaction_type: TransactionType,
        kb_payment_id: KbPaymentId,
        kb_transaction_id: KbTransactionId,
        amount: Option<&Money>,
        properties: Vec<PluginProperty>,
        now: Timestamp,
    ) -> Self {
        Self {
            kb_payment_id,
            kb_transaction_id,
            transaction_type,
            amount: amount.map(|m| m.value),
            currency: amount.map(|m| m.currency.clone()),
            status: PluginStatus::Undefined,
            first_reference_id: None,
            second_reference_id: None,
            gateway_error: None,
            gateway_error_code: None,
            created_date: now,
            effective_date: now,
            properties,
        }
    }

    /// Failed outcome built straight from a rejection, used when the ledger
    /// write for it did not succeed.
    pub fn rejected(attempt: &TransactionAttempt, rejection: &RejectionDetail, now: Timestamp) -> Self {
        Self {
            status: PluginStatus::Error,
            gateway_error: Some(rejection.message.clone()),
            gateway_error_code: rejection.code.clone(),
            ..Self::undefined(
                attempt.transaction_type,
                attempt.kb_payment_id,
                attempt.kb_transaction_id,
                Some(&attempt.amount),
                attempt.properties.clone(),
                now,
            )
        }
    }

    pub fn from_entry(entry: &ResponseEntry) -> Self {
        let gateway_error = entry
            .error_message
            .clone()
            .or_else(|| entry.failure.as_ref().map(|f| f.description.clone()));
        let gateway_error_code = entry
            .error_code
            .clone()
            .or_else(|| entry.failure.as_ref().map(|f| f.code.clone()));

        Self {
            kb_payment_id: entry.kb_payment_id,
            kb_transaction_id: entry.kb_transaction_id,
            transaction_type: entry.transaction_type,
            amount: Some(entry.amount),
            currency: Some(entry.currency.clone()),
            status: entry.plugin_status(),
            first_reference_id: entry.transfer_id.clone(),
            second_reference_id: entry.transfer_status.as_ref().map(|s| s.to_string()),
            gateway_error,
            gateway_error_code,
            created_date: entry.created_at,
            effective_date: entry.created_at,
            properties: entry.properties.clone(),
        }
    }
}
