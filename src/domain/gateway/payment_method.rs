//! Link between a billing-platform payment method and a processor funding source.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{KbAccountId, KbPaymentMethodId, TenantId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodRecord {
    pub kb_account_id: KbAccountId,
    pub kb_payment_method_id: KbPaymentMethodId,
    /// Processor funding-source id (not a link).
    pub funding_source_id: String,
    /// Processor customer id owning the funding source, when known.
    pub customer_id: Option<String>,
    pub is_default: bool,
    pub is_deleted: bool,
    pub tenant_id: TenantId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl PaymentMethodRecord {
    pub fn new(
        tenant_id: TenantId,
        kb_account_id: KbAccountId,
        kb_payment_method_id: KbPaymentMethodId,
        funding_source_id: impl Into<String>,
    ) -> Self {
        let now = Timestamp::now();
        Self {
            kb_account_id,
            kb_payment_method_id,
            funding_source_id: funding_source_id.into(),
            customer_id: None,
            is_default: false,
            is_deleted: false,
            tenant_id,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }
}
