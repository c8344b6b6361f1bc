//! In-memory payment method store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, KbPaymentMethodId, TenantId};
use crate::domain::gateway::PaymentMethodRecord;
use crate::ports::PaymentMethodRepository;

#[derive(Default)]
pub struct InMemoryPaymentMethodRepository {
    records: RwLock<HashMap<(KbPaymentMethodId, TenantId), PaymentMethodRecord>>,
}

impl InMemoryPaymentMethodRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentMethodRepository for InMemoryPaymentMethodRepository {
    async fn find_by_payment_method(
        &self,
        kb_payment_method_id: &KbPaymentMethodId,
        tenant_id: &TenantId,
    ) -> Result<Option<PaymentMethodRecord>, DomainError> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .get(&(*kb_payment_method_id, *tenant_id))
            .filter(|r| !r.is_deleted)
            .cloned())
    }

    async fn save(&self, record: &PaymentMethodRecord) -> Result<(), DomainError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((record.kb_payment_method_id, record.tenant_id), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::KbAccountId;

    #[tokio::test]
    async fn lookup_is_scoped_to_tenant() {
        let repo = InMemoryPaymentMethodRepository::new();
        let tenant = TenantId::new();
        let method = KbPaymentMethodId::new();
        repo.save(&PaymentMethodRecord::new(tenant, KbAccountId::new(), method, "fs-1"))
            .await
            .unwrap();

        assert!(repo.find_by_payment_method(&method, &tenant).await.unwrap().is_some());
        assert!(repo.find_by_payment_method(&method, &TenantId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleted_methods_are_not_returned() {
        let repo = InMemoryPaymentMethodRepository::new();
        let tenant = TenantId::new();
        let method = KbPaymentMethodId::new();
        let mut record = PaymentMethodRecord::new(tenant, KbAccountId::new(), method, "fs-1");
        record.is_deleted = true;
        repo.save(&record).await.unwrap();

        assert!(repo.find_by_payment_method(&method, &tenant).await.unwrap().is_none());
    }
}
