//! TokenRepository port - one OAuth token pair per tenant.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, TenantId};
use crate::domain::gateway::TokenPair;

#[async_trait]
pub trait TokenRepository: Send + Sync {
    async fn find(&self, tenant_id: &TenantId) -> Result<Option<TokenPair>, DomainError>;

    /// Overwrites the tenant's pair in place, creating it if absent.
    async fn save(&self, pair: &TokenPair) -> Result<(), DomainError>;
}
