//! PostgreSQL implementation of PaymentMethodRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, KbAccountId, KbPaymentMethodId, TenantId, Timestamp};
use crate::domain::gateway::PaymentMethodRecord;
use crate::ports::PaymentMethodRepository;

pub struct PostgresPaymentMethodRepository {
    pool: PgPool,
}

impl PostgresPaymentMethodRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentMethodRow {
    kb_payment_method_id: Uuid,
    tenant_id: Uuid,
    kb_account_id: Uuid,
    funding_source_id: String,
    customer_id: Option<String>,
    is_default: bool,
    is_deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<PaymentMethodRow> for PaymentMethodRecord {
    fn from(row: PaymentMethodRow) -> Self {
        PaymentMethodRecord {
            kb_account_id: KbAccountId::from_uuid(row.kb_account_id),
            kb_payment_method_id: KbPaymentMethodId::from_uuid(row.kb_payment_method_id),
            funding_source_id: row.funding_source_id,
            customer_id: row.customer_id,
            is_default: row.is_default,
            is_deleted: row.is_deleted,
            tenant_id: TenantId::from_uuid(row.tenant_id),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        }
    }
}

#[async_trait]
impl PaymentMethodRepository for PostgresPaymentMethodRepository {
    async fn find_by_payment_method(
        &self,
        kb_payment_method_id: &KbPaymentMethodId,
        tenant_id: &TenantId,
    ) -> Result<Option<PaymentMethodRecord>, DomainError> {
        let row: Option<PaymentMethodRow> = sqlx::query_as(
            r#"
            SELECT kb_payment_method_id, tenant_id, kb_account_id, funding_source_id, customer_id,
                   is_default, is_deleted, created_at, updated_at
            FROM dwolla_payment_methods
            WHERE kb_payment_method_id = $1 AND tenant_id = $2 AND NOT is_deleted
            "#,
        )
        .bind(kb_payment_method_id.as_uuid())
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to find payment method: {}", e))
        })?;

        Ok(row.map(PaymentMethodRecord::from))
    }

    async fn save(&self, record: &PaymentMethodRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO dwolla_payment_methods (
                kb_payment_method_id, tenant_id, kb_account_id, funding_source_id, customer_id,
                is_default, is_deleted, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (kb_payment_method_id, tenant_id) DO UPDATE SET
                kb_account_id = EXCLUDED.kb_account_id,
                funding_source_id = EXCLUDED.funding_source_id,
                customer_id = EXCLUDED.customer_id,
                is_default = EXCLUDED.is_default,
                is_deleted = EXCLUDED.is_deleted,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.kb_payment_method_id.as_uuid())
        .bind(record.tenant_id.as_uuid())
        .bind(record.kb_account_id.as_uuid())
        .bind(&record.funding_source_id)
        .bind(&record.customer_id)
        .bind(record.is_default)
        .bind(record.is_deleted)
        .bind(record.created_at.as_datetime())
        .bind(record.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Failed to save payment method: {}", e))
        })?;

        Ok(())
    }
}
