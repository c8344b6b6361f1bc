//! In-memory notification store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, TenantId};
use crate::domain::gateway::{ProcessingState, WebhookRecord};
use crate::ports::{NotificationRepository, SaveResult};

type Key = (String, TenantId);

#[derive(Default)]
pub struct InMemoryNotificationRepository {
    records: RwLock<HashMap<Key, WebhookRecord>>,
}

impl InMemoryNotificationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn state_of(&self, notification_id: &str, tenant_id: &TenantId) -> Option<ProcessingState> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(notification_id.to_string(), *tenant_id))
            .map(|r| r.state)
    }
}

#[async_trait]
impl NotificationRepository for InMemoryNotificationRepository {
    async fn insert(&self, record: &WebhookRecord) -> Result<SaveResult, DomainError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let key = (record.notification_id.clone(), record.tenant_id);
        if records.contains_key(&key) {
            return Ok(SaveResult::AlreadyExists);
        }
        records.insert(key, record.clone());
        Ok(SaveResult::Inserted)
    }

    async fn find(
        &self,
        notification_id: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<WebhookRecord>, DomainError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(notification_id.to_string(), *tenant_id))
            .cloned())
    }

    async fn mark(
        &self,
        notification_id: &str,
        tenant_id: &TenantId,
        state: ProcessingState,
        error_message: Option<&str>,
    ) -> Result<(), DomainError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .get_mut(&(notification_id.to_string(), *tenant_id))
            .ok_or_else(|| {
                DomainError::new(ErrorCode::NotFound, format!("Notification {} not found", notification_id))
            })?;
        record.state = state;
        record.error_message = error_message.map(str::to_string);
        Ok(())
    }

    async fn reclaim_failed(&self, notification_id: &str, tenant_id: &TenantId) -> Result<bool, DomainError> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.get_mut(&(notification_id.to_string(), *tenant_id)) {
            Some(record) if record.state == ProcessingState::Failed => {
                record.state = ProcessingState::Received;
                record.error_message = None;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
