//! Mock Dwolla API for testing.
//!
//! Keeps funding sources and transfers in memory and renders them the way
//! the sandbox does, so handlers run end to end without network access.
//!
//! # Features
//!
//! - One-shot error injection per operation
//! - Idempotency keys replay the original transfer location
//! - Token acceptance and refresh rotation for credential tests
//! - Call log for verification
//!
//! # Example
//!
//! ```ignore
//! let api = MockTransferApi::new();
//! api.add_funding_source("customer-fs", false);
//! api.add_merchant_funding_source("merchant-fs", false);
//! api.set_created_status("failed");
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::gateway::{
    rel, AccessToken, EmbeddedFundingSources, FundingSource, FundingSourceList, HalLink,
    HalLinks, RootResource, TokenResponse, TransferFailure, TransferRecord, TransferRequest,
};
use crate::ports::{ProviderError, TransferApi};

use super::api_types::{transfer_json, TransferResource};

const BASE_URL: &str = "https://api-sandbox.dwolla.com";
const MERCHANT_ACCOUNT_ID: &str = "merchant-account";

#[derive(Debug, Clone)]
enum RefreshReply {
    Tokens { access: String, refresh: String },
    Error { error: String, description: String },
}

#[derive(Debug)]
struct MockState {
    funding_sources: HashMap<String, FundingSource>,
    merchant_sources: Vec<String>,
    transfers: HashMap<String, serde_json::Value>,
    locations_by_key: HashMap<String, String>,
    created: Vec<(TransferRequest, String)>,
    created_status: String,
    failure: Option<TransferFailure>,
    root_errors: VecDeque<ProviderError>,
    create_errors: VecDeque<ProviderError>,
    get_transfer_errors: VecDeque<ProviderError>,
    accepted_token: Option<String>,
    refresh_reply: RefreshReply,
    refresh_delay: Duration,
    refresh_calls: usize,
    calls: Vec<&'static str>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            funding_sources: HashMap::new(),
            merchant_sources: Vec::new(),
            transfers: HashMap::new(),
            locations_by_key: HashMap::new(),
            created: Vec::new(),
            created_status: "pending".to_string(),
            failure: None,
            root_errors: VecDeque::new(),
            create_errors: VecDeque::new(),
            get_transfer_errors: VecDeque::new(),
            accepted_token: None,
            refresh_reply: RefreshReply::Tokens {
                access: "refreshed-access".to_string(),
                refresh: "refreshed-refresh".to_string(),
            },
            refresh_delay: Duration::ZERO,
            refresh_calls: 0,
            calls: Vec::new(),
        }
    }
}

/// In-memory stand-in for the Dwolla API.
#[derive(Debug, Clone, Default)]
pub struct MockTransferApi {
    state: Arc<Mutex<MockState>>,
}

fn not_found() -> ProviderError {
    ProviderError::from_response(
        404,
        r#"{"code":"NotFound","message":"The requested resource was not found."}"#,
    )
}

fn expired_token() -> ProviderError {
    ProviderError::from_response(
        401,
        r#"{"code":"ExpiredAccessToken","message":"Access token is expired."}"#,
    )
}

fn funding_source(id: &str, removed: bool) -> FundingSource {
    let mut links = HalLinks::new();
    links.insert(
        rel::SELF.to_string(),
        HalLink::new(format!("{}/funding-sources/{}", BASE_URL, id)),
    );
    FundingSource {
        id: id.to_string(),
        status: Some("verified".to_string()),
        source_type: Some("bank".to_string()),
        name: Some(format!("Account {}", id)),
        removed,
        links,
    }
}

impl MockTransferApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record_call(&self, name: &'static str) -> MutexGuard<'_, MockState> {
        let mut state = self.state();
        state.calls.push(name);
        state
    }

    // ─── Configuration ───────────────────────────────────────────

    /// Registers a customer funding source.
    pub fn add_funding_source(&self, id: &str, removed: bool) {
        self.state()
            .funding_sources
            .insert(id.to_string(), funding_source(id, removed));
    }

    /// Registers a funding source of the merchant account, appended to its listing.
    pub fn add_merchant_funding_source(&self, id: &str, removed: bool) {
        let mut state = self.state();
        state
            .funding_sources
            .insert(id.to_string(), funding_source(id, removed));
        state.merchant_sources.push(id.to_string());
    }

    /// Status given to transfers created from now on.
    pub fn set_created_status(&self, status: &str) {
        self.state().created_status = status.to_string();
    }

    pub fn set_failure(&self, failure: TransferFailure) {
        self.state().failure = Some(failure);
    }

    pub fn fail_root_once(&self, err: ProviderError) {
        self.state().root_errors.push_back(err);
    }

    pub fn fail_create_once(&self, err: ProviderError) {
        self.state().create_errors.push_back(err);
    }

    pub fn fail_get_transfer_once(&self, err: ProviderError) {
        self.state().get_transfer_errors.push_back(err);
    }

    /// Rejects every bearer credential except this one as expired.
    pub fn accept_only(&self, token: &str) {
        self.state().accepted_token = Some(token.to_string());
    }

    pub fn set_refresh_reply(&self, access: &str, refresh: &str) {
        self.state().refresh_reply = RefreshReply::Tokens {
            access: access.to_string(),
            refresh: refresh.to_string(),
        };
    }

    pub fn set_refresh_error(&self, error: &str, description: &str) {
        self.state().refresh_reply = RefreshReply::Error {
            error: error.to_string(),
            description: description.to_string(),
        };
    }

    /// Latency of the token endpoint, for overlapping refresh attempts.
    pub fn set_refresh_delay(&self, delay: Duration) {
        self.state().refresh_delay = delay;
    }

    // ─── Inspection ──────────────────────────────────────────────

    pub fn merchant_account_href(&self) -> String {
        format!("{}/accounts/{}", BASE_URL, MERCHANT_ACCOUNT_ID)
    }

    /// Transfers created so far with their idempotency keys.
    pub fn created_transfers(&self) -> Vec<(TransferRequest, String)> {
        self.state().created.clone()
    }

    pub fn refresh_calls(&self) -> usize {
        self.state().refresh_calls
    }

    pub fn total_calls(&self) -> usize {
        self.state().calls.len()
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }
}

#[async_trait]
impl TransferApi for MockTransferApi {
    async fn root(&self, token: &AccessToken) -> Result<RootResource, ProviderError> {
        let mut state = self.record_call("root");
        if let Some(err) = state.root_errors.pop_front() {
            return Err(err);
        }
        if let Some(accepted) = &state.accepted_token {
            if accepted != token.expose() {
                return Err(expired_token());
            }
        }
        drop(state);

        let mut links = HalLinks::new();
        links.insert(rel::SELF.to_string(), HalLink::new(format!("{}/", BASE_URL)));
        links.insert(rel::ACCOUNT.to_string(), HalLink::new(self.merchant_account_href()));
        Ok(RootResource { links })
    }

    async fn create_transfer(
        &self,
        _token: &AccessToken,
        request: &TransferRequest,
        idempotency_key: &str,
    ) -> Result<String, ProviderError> {
        let mut state = self.record_call("create_transfer");
        if let Some(err) = state.create_errors.pop_front() {
            return Err(err);
        }
        if let Some(location) = state.locations_by_key.get(idempotency_key) {
            return Ok(location.clone());
        }

        let id = Uuid::new_v4().to_string();
        let location = format!("{}/transfers/{}", BASE_URL, id);
        let body = transfer_json(BASE_URL, &id, &state.created_status, request);
        state.transfers.insert(location.clone(), body);
        state
            .locations_by_key
            .insert(idempotency_key.to_string(), location.clone());
        state.created.push((request.clone(), idempotency_key.to_string()));
        Ok(location)
    }

    async fn get_transfer(&self, _token: &AccessToken, location: &str) -> Result<TransferRecord, ProviderError> {
        let mut state = self.record_call("get_transfer");
        if let Some(err) = state.get_transfer_errors.pop_front() {
            return Err(err);
        }
        let body = state.transfers.get(location).cloned().ok_or_else(not_found)?;
        drop(state);

        let resource: TransferResource = serde_json::from_value(body.clone())
            .map_err(|e| ProviderError::decode(e.to_string()))?;
        Ok(resource.into_record(body))
    }

    async fn get_transfer_failure(
        &self,
        _token: &AccessToken,
        _transfer_id: &str,
    ) -> Result<TransferFailure, ProviderError> {
        let state = self.record_call("get_transfer_failure");
        state.failure.clone().ok_or_else(not_found)
    }

    async fn get_funding_source(
        &self,
        _token: &AccessToken,
        funding_source_id: &str,
    ) -> Result<FundingSource, ProviderError> {
        let state = self.record_call("get_funding_source");
        state
            .funding_sources
            .get(funding_source_id)
            .cloned()
            .ok_or_else(not_found)
    }

    async fn list_account_funding_sources(
        &self,
        _token: &AccessToken,
        account_href: &str,
    ) -> Result<FundingSourceList, ProviderError> {
        let merchant_href = self.merchant_account_href();
        let state = self.record_call("list_account_funding_sources");
        if account_href.trim_end_matches('/') != merchant_href {
            return Ok(FundingSourceList::default());
        }
        let funding_sources = state
            .merchant_sources
            .iter()
            .filter_map(|id| state.funding_sources.get(id).cloned())
            .collect();
        Ok(FundingSourceList {
            embedded: EmbeddedFundingSources { funding_sources },
        })
    }

    async fn refresh_token(&self, _refresh_token: &str) -> Result<TokenResponse, ProviderError> {
        let (reply, delay) = {
            let mut state = self.record_call("refresh_token");
            state.refresh_calls += 1;
            (state.refresh_reply.clone(), state.refresh_delay)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        Ok(match reply {
            RefreshReply::Tokens { access, refresh } => TokenResponse {
                access_token: Some(access),
                refresh_token: Some(refresh),
                expires_in: Some(3600),
                ..TokenResponse::default()
            },
            RefreshReply::Error { error, description } => TokenResponse {
                error: Some(error),
                error_description: Some(description),
                ..TokenResponse::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::gateway::{Money, TransferStatus};
    use rust_decimal::Decimal;

    fn token() -> AccessToken {
        AccessToken::new("access")
    }

    fn request() -> TransferRequest {
        TransferRequest {
            amount: Money::new(Decimal::new(500, 2), "USD"),
            source: HalLink::new(format!("{}/funding-sources/a", BASE_URL)),
            destination: HalLink::new(format!("{}/accounts/b", BASE_URL)),
        }
    }

    #[tokio::test]
    async fn same_idempotency_key_returns_same_location() {
        let api = MockTransferApi::new();

        let first = api.create_transfer(&token(), &request(), "key-1").await.unwrap();
        let second = api.create_transfer(&token(), &request(), "key-1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(api.created_transfers().len(), 1);
    }

    #[tokio::test]
    async fn created_transfer_is_fetchable_with_configured_status() {
        let api = MockTransferApi::new();
        api.set_created_status("processed");

        let location = api.create_transfer(&token(), &request(), "key-1").await.unwrap();
        let record = api.get_transfer(&token(), &location).await.unwrap();

        assert_eq!(record.status, TransferStatus::Processed);
        assert!(location.ends_with(&record.id));
    }

    #[tokio::test]
    async fn accept_only_rejects_other_tokens_as_expired() {
        let api = MockTransferApi::new();
        api.accept_only("fresh");

        let err = api.root(&AccessToken::new("stale")).await.unwrap_err();
        assert!(err.is_auth_failure());
        assert!(api.root(&AccessToken::new("fresh")).await.is_ok());
    }

    #[tokio::test]
    async fn merchant_listing_keeps_registration_order() {
        let api = MockTransferApi::new();
        api.add_merchant_funding_source("first", true);
        api.add_merchant_funding_source("second", false);

        let listing = api
            .list_account_funding_sources(&token(), &api.merchant_account_href())
            .await
            .unwrap();

        assert_eq!(listing.first_active().map(|fs| fs.id.as_str()), Some("second"));
    }
}
