//! Status vocabulary the plugin reports back to the billing platform.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome status of a plugin call, as understood by the billing platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PluginStatus {
    /// Funds movement confirmed.
    Processed,
    /// Accepted by the gateway, final outcome arrives by webhook.
    Pending,
    /// Rejected or failed at the gateway.
    Error,
    Canceled,
    /// The plugin has no opinion (operation not supported by the gateway).
    Undefined,
}

impl PluginStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PluginStatus::Processed => "PROCESSED",
            PluginStatus::Pending => "PENDING",
            PluginStatus::Error => "ERROR",
            PluginStatus::Canceled => "CANCELED",
            PluginStatus::Undefined => "UNDEFINED",
        }
    }
}

impl fmt::Display for PluginStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
