//! PostgreSQL implementation of TokenRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, TenantId, Timestamp};
use crate::domain::gateway::TokenPair;
use crate::ports::TokenRepository;

pub struct PostgresTokenRepository {
    pool: PgPool,
}

impl PostgresTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    tenant_id: Uuid,
    access_token: String,
    refresh_token: String,
    updated_at: DateTime<Utc>,
}

impl From<TokenRow> for TokenPair {
    fn from(row: TokenRow) -> Self {
        TokenPair {
            tenant_id: TenantId::from_uuid(row.tenant_id),
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            updated_at: Timestamp::from_datetime(row.updated_at),
        }
    }
}

#[async_trait]
impl TokenRepository for PostgresTokenRepository {
    async fn find(&self, tenant_id: &TenantId) -> Result<Option<TokenPair>, DomainError> {
        let row: Option<TokenRow> = sqlx::query_as(
            r#"
            SELECT tenant_id, access_token, refresh_token, updated_at
            FROM dwolla_tokens
            WHERE tenant_id = $1
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to load tokens: {}", e)))?;

        Ok(row.map(TokenPair::from))
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO dwolla_tokens (tenant_id, access_token, refresh_token, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(pair.tenant_id.as_uuid())
        .bind(&pair.access_token)
        .bind(&pair.refresh_token)
        .bind(pair.updated_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::new(ErrorCode::DatabaseError, format!("Failed to save tokens: {}", e)))?;

        Ok(())
    }
}
