//! NotificationRepository port - stored webhook deliveries.
//!
//! The `(notification_id, tenant_id)` uniqueness constraint is what makes
//! webhook handling at-most-once. Implementations must report a duplicate
//! insert as [`SaveResult::AlreadyExists`], never as an error.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, TenantId};
use crate::domain::gateway::{ProcessingState, WebhookRecord};

/// Result of attempting to store a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// First time this notification is seen.
    Inserted,
    /// A record with the same identity already exists.
    AlreadyExists,
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, record: &WebhookRecord) -> Result<SaveResult, DomainError>;

    async fn find(
        &self,
        notification_id: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<WebhookRecord>, DomainError>;

    /// Records how processing ended.
    async fn mark(
        &self,
        notification_id: &str,
        tenant_id: &TenantId,
        state: ProcessingState,
        error_message: Option<&str>,
    ) -> Result<(), DomainError>;

    /// Atomically moves a `Failed` record back to `Received`.
    ///
    /// Returns true only for the one caller that performed the move, so a
    /// redelivered notification is retried by exactly one worker.
    async fn reclaim_failed(
        &self,
        notification_id: &str,
        tenant_id: &TenantId,
    ) -> Result<bool, DomainError>;
}
