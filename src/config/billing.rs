//! Billing platform configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::billing::BillingClientConfig;

/// Billing platform REST API credentials
#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    /// Base URL, e.g. `http://killbill:8080`
    pub base_url: String,

    pub api_key: String,

    pub api_secret: SecretString,

    pub username: String,

    pub password: SecretString,

    /// Audit name recorded on state changes
    #[serde(default = "default_created_by")]
    pub created_by: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl BillingConfig {
    pub fn client_config(&self) -> BillingClientConfig {
        BillingClientConfig {
            base_url: self.base_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.clone(),
            api_secret: self.api_secret.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            created_by: self.created_by.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.base_url.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__BASE_URL"));
        }
        if !self.base_url.starts_with("https://") && !self.base_url.starts_with("http://") {
            return Err(ValidationError::InvalidUrl("BILLING__BASE_URL"));
        }
        if self.api_key.is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__API_KEY"));
        }
        if self.api_secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("BILLING__API_SECRET"));
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }
        Ok(())
    }
}

fn default_created_by() -> String {
    "dwolla-gateway".to_string()
}

fn default_timeout() -> u64 {
    30
}
