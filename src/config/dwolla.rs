//! Dwolla configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;
use crate::adapters::dwolla::{DwollaClientConfig, WebhookSignatureVerifier};
use crate::application::MerchantFundingSourcePolicy;

/// Dwolla API credentials and endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct DwollaConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// OAuth token endpoint used for the refresh grant
    #[serde(default = "default_token_url")]
    pub token_url: String,

    pub client_id: SecretString,

    pub client_secret: SecretString,

    /// Webhook subscription secret; signatures are not checked when absent
    pub webhook_secret: Option<SecretString>,

    /// Merchant funding source paying out refunds; first active one when absent
    pub merchant_funding_source_id: Option<String>,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl DwollaConfig {
    pub fn client_config(&self) -> DwollaClientConfig {
        DwollaClientConfig::new(
            self.client_id.expose_secret().clone(),
            self.client_secret.expose_secret().clone(),
        )
        .with_api_base_url(self.api_base_url.clone())
        .with_token_url(self.token_url.clone())
        .with_timeout(Duration::from_secs(self.timeout_secs))
    }

    pub fn merchant_policy(&self) -> MerchantFundingSourcePolicy {
        match self.merchant_funding_source_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => MerchantFundingSourcePolicy::Configured(id.to_string()),
            _ => MerchantFundingSourcePolicy::FirstActive,
        }
    }

    pub fn signature_verifier(&self) -> Option<WebhookSignatureVerifier> {
        self.webhook_secret.clone().map(WebhookSignatureVerifier::new)
    }

    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if self.client_id.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("DWOLLA__CLIENT_ID"));
        }
        if self.client_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("DWOLLA__CLIENT_SECRET"));
        }
        for (name, url) in [("DWOLLA__API_BASE_URL", &self.api_base_url), ("DWOLLA__TOKEN_URL", &self.token_url)] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ValidationError::InvalidUrl(name));
            }
            if environment == Environment::Production && !url.starts_with("https://") {
                return Err(ValidationError::MustBeHttps(name));
            }
        }
        if environment == Environment::Production && self.webhook_secret.is_none() {
            return Err(ValidationError::WebhookSecretRequired);
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

fn default_api_base_url() -> String {
    "https://api-sandbox.dwolla.com".to_string()
}

fn default_token_url() -> String {
    "https://accounts-sandbox.dwolla.com/token".to_string()
}

fn default_timeout() -> u64 {
    30
}
