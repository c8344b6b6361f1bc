//! TokenGuard - Hands out a working bearer credential per tenant.
//!
//! The processor has no token-introspection endpoint, so the stored access
//! token is probed with a root call. An expired or invalid token triggers a
//! refresh inside a per-tenant critical section. The section re-reads the
//! stored pair first: if another caller already replaced the stale token,
//! that token is used and no second refresh is made, so the refresh token is
//! never spent twice.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::domain::foundation::{TenantId, Timestamp};
use crate::domain::gateway::{AccessToken, GatewayError, TokenPair};
use crate::ports::{TokenRepository, TransferApi};

pub struct TokenGuard {
    tokens: Arc<dyn TokenRepository>,
    api: Arc<dyn TransferApi>,
    refresh_locks: DashMap<TenantId, Arc<Mutex<()>>>,
}

impl TokenGuard {
    pub fn new(tokens: Arc<dyn TokenRepository>, api: Arc<dyn TransferApi>) -> Self {
        Self {
            tokens,
            api,
            refresh_locks: DashMap::new(),
        }
    }

    /// Returns a bearer credential the processor currently accepts.
    pub async fn ensure_valid_token(&self, tenant_id: &TenantId) -> Result<AccessToken, GatewayError> {
        let pair = self.load(tenant_id).await?;
        let bearer = pair.bearer();

        match self.api.root(&bearer).await {
            Ok(_) => Ok(bearer),
            Err(err) if err.is_auth_failure() => {
                debug!(tenant_id = %tenant_id, code = ?err.code, "Access token rejected, refreshing");
                self.refresh(tenant_id, &pair.access_token).await
            }
            Err(err) => Err(GatewayError::Remote(err)),
        }
    }

    /// Refreshes after the processor rejected `rejected` in the middle of an
    /// operation. Concurrent callers share one refresh.
    pub async fn refresh_after_rejection(
        &self,
        tenant_id: &TenantId,
        rejected: &AccessToken,
    ) -> Result<AccessToken, GatewayError> {
        debug!(tenant_id = %tenant_id, "Access token rejected mid-operation, refreshing");
        self.refresh(tenant_id, rejected.expose()).await
    }

    async fn load(&self, tenant_id: &TenantId) -> Result<TokenPair, GatewayError> {
        self.tokens
            .find(tenant_id)
            .await
            .map_err(GatewayError::Persistence)?
            .ok_or(GatewayError::TokenMissing(*tenant_id))
    }

    fn lock_for(&self, tenant_id: &TenantId) -> Arc<Mutex<()>> {
        let entry = self
            .refresh_locks
            .entry(*tenant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(&entry)
    }

    async fn refresh(&self, tenant_id: &TenantId, stale_access_token: &str) -> Result<AccessToken, GatewayError> {
        let lock = self.lock_for(tenant_id);
        let _guard = lock.lock().await;

        let current = self.load(tenant_id).await?;
        if current.access_token != stale_access_token {
            debug!(tenant_id = %tenant_id, "Token already refreshed by a concurrent caller");
            return Ok(current.bearer());
        }

        let reply = self
            .api
            .refresh_token(&current.refresh_token)
            .await
            .map_err(GatewayError::Remote)?;

        if let Some(error) = reply.error {
            warn!(
                tenant_id = %tenant_id,
                error = %error,
                description = ?reply.error_description,
                "Token refresh rejected"
            );
            return Err(GatewayError::RefreshFailed {
                error,
                description: reply.error_description,
            });
        }

        let access_token = reply.access_token.ok_or_else(|| GatewayError::RefreshFailed {
            error: "missing_access_token".to_string(),
            description: Some("token endpoint returned no access token".to_string()),
        })?;

        if access_token == current.access_token {
            return Ok(current.bearer());
        }

        let refreshed = TokenPair {
            tenant_id: *tenant_id,
            access_token,
            refresh_token: reply.refresh_token.unwrap_or(current.refresh_token),
            updated_at: Timestamp::now(),
        };
        self.tokens
            .save(&refreshed)
            .await
            .map_err(GatewayError::Persistence)?;

        info!(tenant_id = %tenant_id, expires_in = ?reply.expires_in, "Access token refreshed");
        Ok(refreshed.bearer())
    }
}
