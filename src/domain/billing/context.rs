//! Tenant-scoped call context and pass-through plugin properties.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{TenantId, Timestamp};

/// Context carried by every call from the billing platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    pub tenant_id: TenantId,
    pub now: Timestamp,
}

impl CallContext {
    /// Creates a context stamped with the current time.
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            now: Timestamp::now(),
        }
    }

    /// Creates a context pinned to a specific instant.
    pub fn at(tenant_id: TenantId, now: Timestamp) -> Self {
        Self { tenant_id, now }
    }
}

/// Free-form key/value pair passed through plugin calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginProperty {
    pub key: String,
    pub value: String,
}

impl PluginProperty {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
