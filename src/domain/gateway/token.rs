//! Per-tenant OAuth credentials.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crate::domain::foundation::{TenantId, Timestamp};

/// Stored access/refresh token pair for a tenant.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub tenant_id: TenantId,
    pub access_token: String,
    pub refresh_token: String,
    pub updated_at: Timestamp,
}

impl TokenPair {
    pub fn new(
        tenant_id: TenantId,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            updated_at: Timestamp::now(),
        }
    }

    /// Bearer credential to attach to remote calls.
    pub fn bearer(&self) -> AccessToken {
        AccessToken::new(self.access_token.clone())
    }
}

impl fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenPair")
            .field("tenant_id", &self.tenant_id)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Bearer credential passed explicitly into each remote call.
#[derive(Clone)]
pub struct AccessToken(SecretString);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(SecretString::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

impl PartialEq for AccessToken {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}
