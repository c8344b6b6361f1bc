//! Hard errors of the gateway core.
//!
//! Business rejections by the processor are NOT errors: they are recorded and
//! returned as failed outcomes. Everything here is either an infrastructure
//! failure the caller may retry or a condition an operator must look at.

use thiserror::Error;

use crate::domain::foundation::{DomainError, ErrorCode, KbPaymentMethodId, TenantId};
use crate::ports::ProviderError;

/// Broad classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Store, processor or billing-platform connectivity. Safe to retry.
    TransientInfrastructure,
    /// Money moved but the local record of it could not be written.
    StateInconsistency,
    /// Stored data contradicts itself.
    DataIntegrityViolation,
    /// The request or payload is malformed.
    InvalidInput,
    /// Credentials or merchant setup are missing or unusable.
    Configuration,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No processor credentials on file for tenant {0}")]
    TokenMissing(TenantId),

    #[error("Token refresh rejected: {error}")]
    RefreshFailed {
        error: String,
        description: Option<String>,
    },

    #[error("No funding source recorded for payment method {0}")]
    PaymentMethodNotFound(KbPaymentMethodId),

    #[error("Merchant setup error: {0}")]
    MerchantSetup(String),

    #[error("Persistence failure: {0}")]
    Persistence(DomainError),

    #[error("Processor call failed: {0}")]
    Remote(ProviderError),

    /// The processor accepted the transfer but the ledger write failed.
    #[error("Payment went through, but recording transfer {transfer_id} failed: {source}")]
    StateInconsistency {
        transfer_id: String,
        #[source]
        source: DomainError,
    },

    #[error("Data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("No response recorded for transfer {0}")]
    UnknownTransfer(String),

    #[error("Billing platform call failed: {0}")]
    BillingPlatform(DomainError),

    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    #[error("Invalid payment request: {0}")]
    InvalidRequest(String),
}

impl GatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            GatewayError::TokenMissing(_)
            | GatewayError::RefreshFailed { .. }
            | GatewayError::MerchantSetup(_) => ErrorCategory::Configuration,
            GatewayError::PaymentMethodNotFound(_)
            | GatewayError::InvalidNotification(_)
            | GatewayError::InvalidRequest(_) => ErrorCategory::InvalidInput,
            GatewayError::Persistence(_)
            | GatewayError::Remote(_)
            | GatewayError::BillingPlatform(_)
            | GatewayError::UnknownTransfer(_) => ErrorCategory::TransientInfrastructure,
            GatewayError::StateInconsistency { .. } => ErrorCategory::StateInconsistency,
            GatewayError::DataIntegrity(_) => ErrorCategory::DataIntegrityViolation,
        }
    }

    /// Returns true if repeating the same call may succeed.
    ///
    /// An unknown transfer is retryable: the ledger row may simply not be
    /// visible yet.
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Remote(err) => err.is_retryable(),
            other => other.category() == ErrorCategory::TransientInfrastructure,
        }
    }

    /// Stable machine-readable code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::TokenMissing(_) => "TOKEN_MISSING",
            GatewayError::RefreshFailed { .. } => "REFRESH_FAILED",
            GatewayError::PaymentMethodNotFound(_) => "PAYMENT_METHOD_NOT_FOUND",
            GatewayError::MerchantSetup(_) => "MERCHANT_SETUP",
            GatewayError::Persistence(_) => "PERSISTENCE_FAILURE",
            GatewayError::Remote(_) => "REMOTE_FAILURE",
            GatewayError::StateInconsistency { .. } => "STATE_INCONSISTENCY",
            GatewayError::DataIntegrity(_) => "DATA_INTEGRITY_VIOLATION",
            GatewayError::UnknownTransfer(_) => "UNKNOWN_TRANSFER",
            GatewayError::BillingPlatform(_) => "BILLING_PLATFORM_FAILURE",
            GatewayError::InvalidNotification(_) => "INVALID_NOTIFICATION",
            GatewayError::InvalidRequest(_) => "INVALID_REQUEST",
        }
    }
}

impl From<DomainError> for GatewayError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::IntegrityViolation => GatewayError::DataIntegrity(err.message),
            _ => GatewayError::Persistence(err),
        }
    }
}
