//! PaymentMethodRepository port - billing payment method to funding source.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, KbPaymentMethodId, TenantId};
use crate::domain::gateway::PaymentMethodRecord;

#[async_trait]
pub trait PaymentMethodRepository: Send + Sync {
    /// Looks up a live (not deleted) payment method.
    async fn find_by_payment_method(
        &self,
        kb_payment_method_id: &KbPaymentMethodId,
        tenant_id: &TenantId,
    ) -> Result<Option<PaymentMethodRecord>, DomainError>;

    /// Inserts or replaces the record for its payment method.
    async fn save(&self, record: &PaymentMethodRecord) -> Result<(), DomainError>;
}
