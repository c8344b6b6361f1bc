//! Typed views of processor resources other than transfers.

use serde::{Deserialize, Serialize};

use super::hal::{rel, HalLink, HalLinks};

/// The API root, used both as a credential probe and to find the account link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootResource {
    #[serde(rename = "_links", default)]
    pub links: HalLinks,
}

impl RootResource {
    pub fn account_link(&self) -> Option<&HalLink> {
        self.links.get(rel::ACCOUNT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingSource {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(rename = "type", default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(rename = "_links", default)]
    pub links: HalLinks,
}

impl FundingSource {
    /// Navigable reference to this funding source.
    pub fn self_link(&self) -> Option<&HalLink> {
        self.links.get(rel::SELF)
    }

    pub fn is_active(&self) -> bool {
        !self.removed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedFundingSources {
    #[serde(rename = "funding-sources", default)]
    pub funding_sources: Vec<FundingSource>,
}

/// Funding-source listing of an account, in processor order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingSourceList {
    #[serde(rename = "_embedded", default)]
    pub embedded: EmbeddedFundingSources,
}

impl FundingSourceList {
    pub fn first_active(&self) -> Option<&FundingSource> {
        self.embedded.funding_sources.iter().find(|fs| fs.is_active())
    }

    pub fn find(&self, id: &str) -> Option<&FundingSource> {
        self.embedded.funding_sources.iter().find(|fs| fs.id == id)
    }
}

/// Reply from the token endpoint; carries an error payload instead of tokens on failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"{
        "_links": {"self": {"href": "https://api-sandbox.dwolla.com/accounts/a1/funding-sources"}},
        "_embedded": {
            "funding-sources": [
                {"id": "old", "status": "verified", "type": "bank", "name": "Closed", "removed": true,
                 "_links": {"self": {"href": "https://api-sandbox.dwolla.com/funding-sources/old"}}},
                {"id": "fs1", "status": "verified", "type": "bank", "name": "Operating", "removed": false,
                 "_links": {"self": {"href": "https://api-sandbox.dwolla.com/funding-sources/fs1"}}},
                {"id": "fs2", "status": "verified", "type": "balance", "name": "Balance", "removed": false,
                 "_links": {"self": {"href": "https://api-sandbox.dwolla.com/funding-sources/fs2"}}}
            ]
        }
    }"#;

    #[test]
    fn listing_parses_embedded_sources_in_order() {
        let list: FundingSourceList = serde_json::from_str(LISTING).unwrap();
        let ids: Vec<_> = list.embedded.funding_sources.iter().map(|fs| fs.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "fs1", "fs2"]);
    }

    #[test]
    fn first_active_skips_removed_sources() {
        let list: FundingSourceList = serde_json::from_str(LISTING).unwrap();
        assert_eq!(list.first_active().map(|fs| fs.id.as_str()), Some("fs1"));
    }

    #[test]
    fn empty_listing_has_no_active_source() {
        let list: FundingSourceList = serde_json::from_str(r#"{"_links":{}}"#).unwrap();
        assert!(list.first_active().is_none());
    }

    #[test]
    fn root_exposes_account_link() {
        let root: RootResource = serde_json::from_str(
            r#"{"_links":{"account":{"href":"https://api-sandbox.dwolla.com/accounts/a1"}}}"#,
        )
        .unwrap();
        assert_eq!(root.account_link().unwrap().href, "https://api-sandbox.dwolla.com/accounts/a1");
    }

    #[test]
    fn token_error_payload_parses() {
        let reply: TokenResponse =
            serde_json::from_str(r#"{"error":"invalid_grant","error_description":"Refresh token expired"}"#).unwrap();
        assert_eq!(reply.error.as_deref(), Some("invalid_grant"));
        assert!(reply.access_token.is_none());
    }
}
