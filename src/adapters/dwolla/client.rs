//! Dwolla REST adapter.
//!
//! Implements `TransferApi` over HTTPS with the HAL+JSON media type. The
//! bearer credential arrives with every call; the client itself only holds
//! OAuth application credentials for the refresh grant.
//!
//! # Configuration
//!
//! ```ignore
//! let config = DwollaClientConfig::new(client_id, client_secret)
//!     .with_api_base_url("https://api-sandbox.dwolla.com");
//! let api = DwollaTransferApi::new(config);
//! ```

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, LOCATION};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::domain::gateway::{
    AccessToken, FundingSource, FundingSourceList, RootResource, TokenResponse, TransferFailure,
    TransferRecord, TransferRequest,
};
use crate::ports::{ProviderError, TransferApi};

use super::api_types::{CreateTransferBody, TransferResource};

/// Media type of every Dwolla request and response.
pub const HAL_JSON: &str = "application/vnd.dwolla.v1.hal+json";

const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// Dwolla API configuration.
#[derive(Clone)]
pub struct DwollaClientConfig {
    client_id: SecretString,
    client_secret: SecretString,
    api_base_url: String,
    token_url: String,
    timeout: Duration,
}

impl DwollaClientConfig {
    /// Creates a sandbox configuration.
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: SecretString::new(client_id.into()),
            client_secret: SecretString::new(client_secret.into()),
            api_base_url: "https://api-sandbox.dwolla.com".to_string(),
            token_url: "https://accounts-sandbox.dwolla.com/token".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

pub struct DwollaTransferApi {
    config: DwollaClientConfig,
    http_client: reqwest::Client,
}

impl DwollaTransferApi {
    pub fn new(config: DwollaClientConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { config, http_client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base_url, path.trim_start_matches('/'))
    }

    async fn get_value(&self, token: &AccessToken, url: &str) -> Result<serde_json::Value, ProviderError> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(token.expose())
            .header(ACCEPT, HAL_JSON)
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = ProviderError::from_response(status.as_u16(), &body);
            tracing::warn!(
                url = %url,
                status = status.as_u16(),
                code = ?err.code,
                "Dwolla request failed"
            );
            return Err(err);
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::decode(format!("Failed to read Dwolla response: {}", e)))
    }

    async fn get_typed<T: DeserializeOwned>(&self, token: &AccessToken, url: &str) -> Result<T, ProviderError> {
        let value = self.get_value(token, url).await?;
        decode(value)
    }
}

fn decode<T: DeserializeOwned>(value: serde_json::Value) -> Result<T, ProviderError> {
    serde_json::from_value(value)
        .map_err(|e| ProviderError::decode(format!("Failed to parse Dwolla response: {}", e)))
}

#[async_trait]
impl TransferApi for DwollaTransferApi {
    async fn root(&self, token: &AccessToken) -> Result<RootResource, ProviderError> {
        self.get_typed(token, &self.url("/")).await
    }

    async fn create_transfer(
        &self,
        token: &AccessToken,
        request: &TransferRequest,
        idempotency_key: &str,
    ) -> Result<String, ProviderError> {
        let url = self.url("transfers");
        let body = serde_json::to_vec(&CreateTransferBody::from(request))
            .map_err(|e| ProviderError::decode(format!("Failed to encode transfer: {}", e)))?;

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token.expose())
            .header(ACCEPT, HAL_JSON)
            .header(CONTENT_TYPE, HAL_JSON)
            .header(IDEMPOTENCY_KEY, idempotency_key)
            .body(body)
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = ProviderError::from_response(status.as_u16(), &text);
            tracing::warn!(status = status.as_u16(), code = ?err.code, message = %err.message, "Dwolla create transfer failed");
            return Err(err);
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::decode("Transfer created without a Location header"))
    }

    async fn get_transfer(&self, token: &AccessToken, location: &str) -> Result<TransferRecord, ProviderError> {
        let value = self.get_value(token, location).await?;
        let resource: TransferResource = decode(value.clone())?;
        Ok(resource.into_record(value))
    }

    async fn get_transfer_failure(
        &self,
        token: &AccessToken,
        transfer_id: &str,
    ) -> Result<TransferFailure, ProviderError> {
        self.get_typed(token, &self.url(&format!("transfers/{}/failure", transfer_id)))
            .await
    }

    async fn get_funding_source(
        &self,
        token: &AccessToken,
        funding_source_id: &str,
    ) -> Result<FundingSource, ProviderError> {
        self.get_typed(token, &self.url(&format!("funding-sources/{}", funding_source_id)))
            .await
    }

    async fn list_account_funding_sources(
        &self,
        token: &AccessToken,
        account_href: &str,
    ) -> Result<FundingSourceList, ProviderError> {
        let url = format!("{}/funding-sources", account_href.trim_end_matches('/'));
        self.get_typed(token, &url).await
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", self.config.client_id.expose_secret().as_str()),
            ("client_secret", self.config.client_secret.expose_secret().as_str()),
        ];

        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ProviderError::network(e.to_string()))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        // OAuth errors arrive as 4xx with an `error` member.
        match serde_json::from_str::<TokenResponse>(&text) {
            Ok(reply) if status.is_success() || reply.error.is_some() => Ok(reply),
            _ => Err(ProviderError::from_response(status.as_u16(), &text)),
        }
    }
}
