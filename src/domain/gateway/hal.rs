//! HAL link references used by the processor's resource model.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known link relation names.
pub mod rel {
    pub const SELF: &str = "self";
    pub const SOURCE: &str = "source";
    pub const DESTINATION: &str = "destination";
    pub const RESOURCE: &str = "resource";
    pub const ACCOUNT: &str = "account";
    pub const FAILURE: &str = "failure";
    pub const FUNDING_SOURCES: &str = "funding-sources";
}

/// A navigable reference embedded in a resource representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalLink {
    pub href: String,

    #[serde(rename = "resource-type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
}

impl HalLink {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            resource_type: None,
        }
    }

    /// Returns the trailing path segment of the href, which is the resource id.
    pub fn id(&self) -> Option<&str> {
        self.href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty() && !segment.contains(':'))
    }
}

/// Link relation map carried under `_links`.
pub type HalLinks = HashMap<String, HalLink>;
