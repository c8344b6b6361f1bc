//! PostgreSQL implementation of NotificationRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, TenantId, Timestamp};
use crate::domain::gateway::{ProcessingState, WebhookRecord};
use crate::ports::{NotificationRepository, SaveResult};

pub struct PostgresNotificationRepository {
    pool: PgPool,
}

impl PostgresNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    notification_id: String,
    tenant_id: Uuid,
    topic: String,
    resource_href: Option<String>,
    raw_payload: String,
    state: String,
    error_message: Option<String>,
    received_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for WebhookRecord {
    type Error = DomainError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let state = ProcessingState::parse(&row.state).ok_or_else(|| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid state value: {}", row.state))
        })?;
        Ok(WebhookRecord {
            notification_id: row.notification_id,
            topic: row.topic,
            resource_href: row.resource_href,
            raw_payload: row.raw_payload,
            state,
            error_message: row.error_message,
            received_at: Timestamp::from_datetime(row.received_at),
            tenant_id: TenantId::from_uuid(row.tenant_id),
        })
    }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
    async fn insert(&self, record: &WebhookRecord) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO dwolla_notifications (
                notification_id, tenant_id, topic, resource_href, raw_payload, state, received_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.notification_id)
        .bind(record.tenant_id.as_uuid())
        .bind(&record.topic)
        .bind(&record.resource_href)
        .bind(&record.raw_payload)
        .bind(record.state.as_str())
        .bind(record.received_at.as_datetime())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(SaveResult::Inserted),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(SaveResult::AlreadyExists),
            Err(e) => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Failed to store notification: {}", e),
            )),
        }
    }

    async fn find(
        &self,
        notification_id: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<WebhookRecord>, DomainError> {
        let row: Option<NotificationRow> = sqlx::query_as(
            r#"
            SELECT notification_id, tenant_id, topic, resource_href, raw_payload, state,
                   error_message, received_at
            FROM dwolla_notifications
            WHERE notification_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to find notification: {}", e)))?;

        row.map(WebhookRecord::try_from).transpose()
    }

    async fn mark(
        &self,
        notification_id: &str,
        tenant_id: &TenantId,
        state: ProcessingState,
        error_message: Option<&str>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE dwolla_notifications SET state = $3, error_message = $4
            WHERE notification_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(notification_id)
        .bind(tenant_id.as_uuid())
        .bind(state.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to update notification: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::new(
                ErrorCode::NotFound,
                format!("Notification {} not found", notification_id),
            ));
        }
        Ok(())
    }

    async fn reclaim_failed(&self, notification_id: &str, tenant_id: &TenantId) -> Result<bool, DomainError> {
        // Conditional update: only one concurrent redelivery wins.
        let result = sqlx::query(
            r#"
            UPDATE dwolla_notifications SET state = 'received', error_message = NULL
            WHERE notification_id = $1 AND tenant_id = $2 AND state = 'failed'
            "#,
        )
        .bind(notification_id)
        .bind(tenant_id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to reclaim notification: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }
}
