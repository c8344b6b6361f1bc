//! In-memory token store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, TenantId};
use crate::domain::gateway::TokenPair;
use crate::ports::TokenRepository;

#[derive(Default)]
pub struct InMemoryTokenRepository {
    pairs: RwLock<HashMap<TenantId, TokenPair>>,
    saves: AtomicUsize,
}

impl InMemoryTokenRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenRepository for InMemoryTokenRepository {
    async fn find(&self, tenant_id: &TenantId) -> Result<Option<TokenPair>, DomainError> {
        let pairs = self.pairs.read().unwrap_or_else(PoisonError::into_inner);
        Ok(pairs.get(tenant_id).cloned())
    }

    async fn save(&self, pair: &TokenPair) -> Result<(), DomainError> {
        self.pairs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pair.tenant_id, pair.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
