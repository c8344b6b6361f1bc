//! Transfer API port - the payment processor's remote API.
//!
//! Every call takes the bearer credential explicitly; implementations never
//! hold a current token of their own, so concurrent tenants cannot observe
//! each other's credentials.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;

use crate::domain::gateway::{
    AccessToken, FundingSource, FundingSourceList, RootResource, TokenResponse, TransferFailure,
    TransferRecord, TransferRequest,
};

/// Processor error codes that mean the bearer credential is unusable.
pub const EXPIRED_ACCESS_TOKEN: &str = "ExpiredAccessToken";
pub const INVALID_ACCESS_TOKEN: &str = "InvalidAccessToken";

#[async_trait]
pub trait TransferApi: Send + Sync {
    /// Fetches the API root. Also serves as a cheap credential probe.
    async fn root(&self, token: &AccessToken) -> Result<RootResource, ProviderError>;

    /// Submits a transfer and returns the `Location` of the created resource.
    ///
    /// The idempotency key makes a retried submission return the original
    /// transfer instead of creating a second one.
    async fn create_transfer(
        &self,
        token: &AccessToken,
        request: &TransferRequest,
        idempotency_key: &str,
    ) -> Result<String, ProviderError>;

    /// Fetches a transfer by its full resource URL.
    async fn get_transfer(
        &self,
        token: &AccessToken,
        location: &str,
    ) -> Result<TransferRecord, ProviderError>;

    /// Fetches the failure reason of a failed transfer.
    async fn get_transfer_failure(
        &self,
        token: &AccessToken,
        transfer_id: &str,
    ) -> Result<TransferFailure, ProviderError>;

    async fn get_funding_source(
        &self,
        token: &AccessToken,
        funding_source_id: &str,
    ) -> Result<FundingSource, ProviderError>;

    /// Lists an account's funding sources in processor order.
    async fn list_account_funding_sources(
        &self,
        token: &AccessToken,
        account_href: &str,
    ) -> Result<FundingSourceList, ProviderError>;

    /// Exchanges a refresh token for a new pair. Error payloads come back as
    /// `Ok` with `error` set.
    async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError>;
}

/// Category of a remote failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderErrorKind {
    /// Bearer credential expired or invalid.
    Unauthorized,
    /// The processor refused the request (validation, insufficient funds, ...).
    Rejected,
    NotFound,
    RateLimited,
    Network,
    Server,
    /// Response could not be understood.
    Decode,
}

impl ProviderErrorKind {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderErrorKind::Network | ProviderErrorKind::Server | ProviderErrorKind::RateLimited
        )
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderErrorKind::Unauthorized => "unauthorized",
            ProviderErrorKind::Rejected => "rejected",
            ProviderErrorKind::NotFound => "not_found",
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::Network => "network_error",
            ProviderErrorKind::Server => "server_error",
            ProviderErrorKind::Decode => "decode_error",
        };
        write!(f, "{}", s)
    }
}

/// Error returned by a processor call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    /// HTTP status, when a response was received.
    pub status: Option<u16>,
    /// Processor error code, e.g. `ValidationError`.
    pub code: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedErrors>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedErrors {
    #[serde(default)]
    errors: Vec<NestedError>,
}

#[derive(Debug, Deserialize)]
struct NestedError {
    code: Option<String>,
    message: Option<String>,
    path: Option<String>,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            code: None,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Decode, message)
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Builds an error from a non-success HTTP response.
    ///
    /// The body's `code` and `message` are used when present; the first
    /// embedded validation error, if any, is appended to the message.
    pub fn from_response(status: u16, body: &str) -> Self {
        let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();

        let (code, message) = match parsed {
            Some(body) => {
                let mut message = body
                    .message
                    .unwrap_or_else(|| format!("HTTP {}", status));
                if let Some(first) = body.embedded.and_then(|e| e.errors.into_iter().next()) {
                    let detail = match (first.code, first.message) {
                        (Some(code), Some(msg)) => format!("{}: {}", code, msg),
                        (Some(code), None) => code,
                        (None, Some(msg)) => msg,
                        (None, None) => String::new(),
                    };
                    if !detail.is_empty() {
                        match first.path {
                            Some(path) => message = format!("{} ({} at {})", message, detail, path),
                            None => message = format!("{} ({})", message, detail),
                        }
                    }
                }
                (body.code, message)
            }
            None if body.trim().is_empty() => (None, format!("HTTP {}", status)),
            None => (None, body.trim().to_string()),
        };

        let kind = match (status, code.as_deref()) {
            (_, Some(EXPIRED_ACCESS_TOKEN)) | (_, Some(INVALID_ACCESS_TOKEN)) | (401, _) => {
                ProviderErrorKind::Unauthorized
            }
            (404, _) => ProviderErrorKind::NotFound,
            (429, _) => ProviderErrorKind::RateLimited,
            (s, _) if s >= 500 => ProviderErrorKind::Server,
            _ => ProviderErrorKind::Rejected,
        };

        Self {
            kind,
            status: Some(status),
            code,
            message,
        }
    }

    /// True when the credential must be refreshed before retrying.
    pub fn is_auth_failure(&self) -> bool {
        self.kind == ProviderErrorKind::Unauthorized
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{} [{}]: {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for ProviderError {}
