//! PostgreSQL implementation of ResponseRepository.
//!
//! Ledger rows are keyed by `(kb_transaction_id, tenant_id)`. Writes are
//! upserts: a retried attempt converges on the same row. A failure never
//! overwrites a row that already references a transfer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{PluginProperty, TransactionType};
use crate::domain::foundation::{
    DomainError, ErrorCode, KbAccountId, KbPaymentId, KbPaymentMethodId, KbTransactionId, TenantId,
    Timestamp,
};
use crate::domain::gateway::{
    RejectionDetail, ResponseEntry, TransactionAttempt, TransferFailure, TransferRecord,
    TransferStatus,
};
use crate::ports::ResponseRepository;

const COLUMNS: &str = r#"
    id, tenant_id, kb_account_id, kb_payment_id, kb_transaction_id, kb_payment_method_id,
    transaction_type, amount, currency, transfer_id, transfer_status, transfer_snapshot,
    failure, error_code, error_message, properties, created_at
"#;

const ON_CONFLICT_SUCCESS: &str = r#"
    DO UPDATE SET
        transfer_id = EXCLUDED.transfer_id,
        transfer_status = EXCLUDED.transfer_status,
        transfer_snapshot = EXCLUDED.transfer_snapshot,
        failure = EXCLUDED.failure,
        error_code = EXCLUDED.error_code,
        error_message = EXCLUDED.error_message
"#;

const ON_CONFLICT_FAILURE: &str = r#"
    DO UPDATE SET
        error_code = EXCLUDED.error_code,
        error_message = EXCLUDED.error_message
    WHERE dwolla_responses.transfer_id IS NULL
"#;

pub struct PostgresResponseRepository {
    pool: PgPool,
}

impl PostgresResponseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts the entry or applies `on_conflict` to the attempt's existing row.
    ///
    /// Returns `None` when the conflict clause filtered the update out.
    async fn upsert(&self, entry: &ResponseEntry, on_conflict: &str) -> Result<Option<ResponseEntry>, DomainError> {
        let failure = entry
            .failure
            .as_ref()
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| DomainError::new(ErrorCode::InternalError, format!("Failed to encode failure: {}", e)))?;
        let properties = serde_json::to_value(&entry.properties)
            .map_err(|e| DomainError::new(ErrorCode::InternalError, format!("Failed to encode properties: {}", e)))?;

        let sql = format!(
            r#"
            INSERT INTO dwolla_responses ({columns})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            ON CONFLICT (kb_transaction_id, tenant_id) {on_conflict}
            RETURNING {columns}
            "#,
            columns = COLUMNS,
            on_conflict = on_conflict,
        );

        let row: Option<ResponseRow> = sqlx::query_as(&sql)
            .bind(entry.id)
            .bind(entry.tenant_id.as_uuid())
            .bind(entry.kb_account_id.as_uuid())
            .bind(entry.kb_payment_id.as_uuid())
            .bind(entry.kb_transaction_id.as_uuid())
            .bind(entry.kb_payment_method_id.as_uuid())
            .bind(entry.transaction_type.as_str())
            .bind(entry.amount)
            .bind(&entry.currency)
            .bind(&entry.transfer_id)
            .bind(entry.transfer_status.as_ref().map(TransferStatus::as_str))
            .bind(&entry.transfer_snapshot)
            .bind(failure)
            .bind(&entry.error_code)
            .bind(&entry.error_message)
            .bind(properties)
            .bind(entry.created_at.as_datetime())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to record response: {}", e)))?;

        row.map(ResponseEntry::try_from).transpose()
    }

    async fn fetch_where(
        &self,
        clause: &str,
        key: Uuid,
        tenant_id: &TenantId,
    ) -> Result<Vec<ResponseEntry>, DomainError> {
        let sql = format!(
            "SELECT {} FROM dwolla_responses WHERE {} = $1 AND tenant_id = $2 ORDER BY created_at ASC",
            COLUMNS, clause
        );
        let rows: Vec<ResponseRow> = sqlx::query_as(&sql)
            .bind(key)
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to query responses: {}", e)))?;

        rows.into_iter().map(ResponseEntry::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ResponseRow {
    id: Uuid,
    tenant_id: Uuid,
    kb_account_id: Uuid,
    kb_payment_id: Uuid,
    kb_transaction_id: Uuid,
    kb_payment_method_id: Uuid,
    transaction_type: String,
    amount: Decimal,
    currency: String,
    transfer_id: Option<String>,
    transfer_status: Option<String>,
    transfer_snapshot: Option<serde_json::Value>,
    failure: Option<serde_json::Value>,
    error_code: Option<String>,
    error_message: Option<String>,
    properties: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl TryFrom<ResponseRow> for ResponseEntry {
    type Error = DomainError;

    fn try_from(row: ResponseRow) -> Result<Self, Self::Error> {
        let transaction_type: TransactionType = row.transaction_type.parse().map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid transaction_type: {}", e))
        })?;
        let failure: Option<TransferFailure> = row
            .failure
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Invalid failure: {}", e)))?;
        let properties: Vec<PluginProperty> = serde_json::from_value(row.properties)
            .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Invalid properties: {}", e)))?;

        Ok(ResponseEntry {
            id: row.id,
            tenant_id: TenantId::from_uuid(row.tenant_id),
            kb_account_id: KbAccountId::from_uuid(row.kb_account_id),
            kb_payment_id: KbPaymentId::from_uuid(row.kb_payment_id),
            kb_transaction_id: KbTransactionId::from_uuid(row.kb_transaction_id),
            kb_payment_method_id: KbPaymentMethodId::from_uuid(row.kb_payment_method_id),
            transaction_type,
            amount: row.amount,
            currency: row.currency.trim().to_string(),
            transfer_id: row.transfer_id,
            transfer_status: row.transfer_status.as_deref().map(TransferStatus::parse),
            transfer_snapshot: row.transfer_snapshot,
            failure,
            error_code: row.error_code,
            error_message: row.error_message,
            properties,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl ResponseRepository for PostgresResponseRepository {
    async fn record_success(
        &self,
        attempt: &TransactionAttempt,
        transfer: &TransferRecord,
        now: Timestamp,
    ) -> Result<ResponseEntry, DomainError> {
        let entry = ResponseEntry::success(attempt, transfer, now);
        self.upsert(&entry, ON_CONFLICT_SUCCESS).await?.ok_or_else(|| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Upsert of transaction {} returned no row", attempt.kb_transaction_id),
            )
        })
    }

    async fn record_failure(
        &self,
        attempt: &TransactionAttempt,
        rejection: &RejectionDetail,
        now: Timestamp,
    ) -> Result<ResponseEntry, DomainError> {
        let entry = ResponseEntry::failure(attempt, rejection, now);
        if let Some(recorded) = self.upsert(&entry, ON_CONFLICT_FAILURE).await? {
            return Ok(recorded);
        }
        // The attempt already references a transfer; keep that row.
        self.fetch_where("kb_transaction_id", *attempt.kb_transaction_id.as_uuid(), &attempt.tenant_id)
            .await?
            .pop()
            .ok_or_else(|| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Ledger row for transaction {} vanished", attempt.kb_transaction_id),
                )
            })
    }

    async fn find_by_payment_method(
        &self,
        kb_payment_method_id: &KbPaymentMethodId,
        tenant_id: &TenantId,
    ) -> Result<Vec<ResponseEntry>, DomainError> {
        self.fetch_where("kb_payment_method_id", *kb_payment_method_id.as_uuid(), tenant_id)
            .await
    }

    async fn find_by_payment_id(
        &self,
        kb_payment_id: &KbPaymentId,
        tenant_id: &TenantId,
    ) -> Result<Vec<ResponseEntry>, DomainError> {
        self.fetch_where("kb_payment_id", *kb_payment_id.as_uuid(), tenant_id)
            .await
    }

    async fn find_by_transfer_id(
        &self,
        transfer_id: &str,
        tenant_id: &TenantId,
    ) -> Result<Option<ResponseEntry>, DomainError> {
        let sql = format!(
            "SELECT {} FROM dwolla_responses WHERE transfer_id = $1 AND tenant_id = $2 LIMIT 2",
            COLUMNS
        );
        let mut rows: Vec<ResponseRow> = sqlx::query_as(&sql)
            .bind(transfer_id)
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to find response: {}", e)))?;

        if rows.len() > 1 {
            return Err(DomainError::new(
                ErrorCode::IntegrityViolation,
                format!("More than one ledger entry references transfer {}", transfer_id),
            ));
        }
        rows.pop().map(ResponseEntry::try_from).transpose()
    }

    async fn update_status(
        &self,
        transfer_id: &str,
        status: &TransferStatus,
        tenant_id: &TenantId,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE dwolla_responses SET transfer_status = $3
            WHERE transfer_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(transfer_id)
        .bind(tenant_id.as_uuid())
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to update transfer status: {}", e)))?;

        Ok(())
    }
}
