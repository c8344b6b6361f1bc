//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `DWOLLA_GATEWAY`
//! prefix and nested values use double underscores.
//!
//! # Example
//!
//! ```no_run
//! use dwolla_gateway::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod billing;
mod database;
mod dwolla;
mod error;
mod server;

pub use billing::BillingConfig;
pub use database::DatabaseConfig;
pub use dwolla::DwollaConfig;
pub use error::{ConfigError, ValidationError};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub dwolla: DwollaConfig,

    pub billing: BillingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` if present (development)
    /// 2. Reads variables with the `DWOLLA_GATEWAY` prefix
    /// 3. Splits nested keys on `__`
    ///
    /// - `DWOLLA_GATEWAY__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `DWOLLA_GATEWAY__DWOLLA__CLIENT_ID=...` -> `dwolla.client_id = ...`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("DWOLLA_GATEWAY")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all sections; the first failure wins.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.dwolla.validate(self.server.environment)?;
        self.billing.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::MerchantFundingSourcePolicy;
    use std::env;
    use std::sync::Mutex;

    // Env vars are process-global; tests touching them run one at a time.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[(&str, &str)] = &[
        ("DWOLLA_GATEWAY__DATABASE__URL", "postgresql://kb@localhost/killbill"),
        ("DWOLLA_GATEWAY__DWOLLA__CLIENT_ID", "client-id"),
        ("DWOLLA_GATEWAY__DWOLLA__CLIENT_SECRET", "client-secret"),
        ("DWOLLA_GATEWAY__BILLING__BASE_URL", "http://localhost:8080"),
        ("DWOLLA_GATEWAY__BILLING__API_KEY", "bob"),
        ("DWOLLA_GATEWAY__BILLING__API_SECRET", "lazar"),
        ("DWOLLA_GATEWAY__BILLING__USERNAME", "admin"),
        ("DWOLLA_GATEWAY__BILLING__PASSWORD", "password"),
    ];

    const OPTIONAL: &[&str] = &[
        "DWOLLA_GATEWAY__SERVER__PORT",
        "DWOLLA_GATEWAY__SERVER__ENVIRONMENT",
        "DWOLLA_GATEWAY__DWOLLA__MERCHANT_FUNDING_SOURCE_ID",
    ];

    fn set_minimal_env() {
        for (key, value) in VARS {
            env::set_var(key, value);
        }
    }

    fn clear_env() {
        for (key, _) in VARS {
            env::remove_var(key);
        }
        for key in OPTIONAL {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.database.url, "postgresql://kb@localhost/killbill");
        assert_eq!(config.billing.created_by, "dwolla-gateway");
        assert_eq!(config.dwolla.api_base_url, "https://api-sandbox.dwolla.com");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_server_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("DWOLLA_GATEWAY__SERVER__PORT", "3000");
        env::set_var("DWOLLA_GATEWAY__SERVER__ENVIRONMENT", "sandbox");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.environment, Environment::Sandbox);
        assert!(!config.is_production());
    }

    #[test]
    fn test_merchant_funding_source_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("DWOLLA_GATEWAY__DWOLLA__MERCHANT_FUNDING_SOURCE_ID", "fs-merchant");
        let result = AppConfig::load();
        clear_env();

        assert_eq!(
            result.unwrap().dwolla.merchant_policy(),
            MerchantFundingSourcePolicy::Configured("fs-merchant".to_string())
        );
    }

    #[test]
    fn test_production_without_webhook_secret_is_invalid() {
        let _guard = ENV_MUTEX.lock().unwrap();
        set_minimal_env();
        env::set_var("DWOLLA_GATEWAY__SERVER__ENVIRONMENT", "production");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.is_production());
        assert_eq!(config.validate(), Err(ValidationError::WebhookSecretRequired));
    }
}
