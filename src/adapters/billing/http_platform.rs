//! Kill Bill REST client.
//!
//! Requests authenticate with basic auth plus the tenant api key/secret
//! headers. State changes carry the `X-Killbill-CreatedBy` audit header.

use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::billing::{
    Account, CallContext, Payment, PaymentTransaction, TransactionStatus, TransactionType,
};
use crate::domain::foundation::{DomainError, ErrorCode, KbAccountId, KbPaymentId, KbTransactionId};
use crate::ports::BillingPlatform;

const API_KEY_HEADER: &str = "X-Killbill-ApiKey";
const API_SECRET_HEADER: &str = "X-Killbill-ApiSecret";
const CREATED_BY_HEADER: &str = "X-Killbill-CreatedBy";

#[derive(Clone)]
pub struct BillingClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub api_secret: SecretString,
    pub username: String,
    pub password: SecretString,
    pub created_by: String,
    pub timeout: Duration,
}

pub struct HttpBillingPlatform {
    config: BillingClientConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentJson {
    payment_id: KbPaymentId,
    account_id: KbAccountId,
    #[serde(default)]
    transactions: Vec<TransactionJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionJson {
    transaction_id: KbTransactionId,
    transaction_type: String,
    status: String,
    #[serde(default)]
    amount: Option<Decimal>,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountJson {
    account_id: KbAccountId,
    #[serde(default)]
    external_key: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StateChangeJson<'a> {
    payment_id: KbPaymentId,
    transaction_id: &'a KbTransactionId,
    status: &'a str,
}

fn parse_status(raw: &str) -> TransactionStatus {
    match raw.to_ascii_uppercase().as_str() {
        "PENDING" => TransactionStatus::Pending,
        "SUCCESS" => TransactionStatus::Success,
        "PAYMENT_FAILURE" => TransactionStatus::PaymentFailure,
        "PLUGIN_FAILURE" => TransactionStatus::PluginFailure,
        _ => TransactionStatus::Unknown,
    }
}

impl TryFrom<PaymentJson> for Payment {
    type Error = DomainError;

    fn try_from(json: PaymentJson) -> Result<Self, Self::Error> {
        let transactions = json
            .transactions
            .into_iter()
            .map(|t| {
                let transaction_type: TransactionType = t.transaction_type.parse().map_err(|e| {
                    DomainError::new(ErrorCode::ExternalServiceError, format!("Invalid transaction type: {}", e))
                })?;
                Ok(PaymentTransaction {
                    id: t.transaction_id,
                    transaction_type,
                    status: parse_status(&t.status),
                    amount: t.amount,
                    currency: t.currency,
                })
            })
            .collect::<Result<Vec<_>, DomainError>>()?;

        Ok(Payment {
            id: json.payment_id,
            account_id: json.account_id,
            transactions,
        })
    }
}

impl HttpBillingPlatform {
    pub fn new(config: BillingClientConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });
        Self { config, http_client }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, format!("{}/1.0/kb/{}", self.config.base_url, path))
            .basic_auth(&self.config.username, Some(self.config.password.expose_secret()))
            .header(API_KEY_HEADER, &self.config.api_key)
            .header(API_SECRET_HEADER, self.config.api_secret.expose_secret().as_str())
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response, DomainError> {
        let response = builder.send().await.map_err(|e| {
            DomainError::new(ErrorCode::ExternalServiceError, format!("Billing platform unreachable: {}", e))
        })?;

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(DomainError::new(ErrorCode::NotFound, format!("{} not found", what))),
            status => {
                let body = response.text().await.unwrap_or_default();
                tracing::warn!(status = status.as_u16(), body = %body, "Billing platform request failed");
                Err(DomainError::new(
                    ErrorCode::ExternalServiceError,
                    format!("Billing platform returned {} for {}", status, what),
                ))
            }
        }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T, DomainError> {
        response.json::<T>().await.map_err(|e| {
            DomainError::new(ErrorCode::ExternalServiceError, format!("Failed to parse {}: {}", what, e))
        })
    }
}

#[async_trait]
impl BillingPlatform for HttpBillingPlatform {
    async fn get_payment(&self, kb_payment_id: &KbPaymentId, _context: &CallContext) -> Result<Payment, DomainError> {
        let what = format!("payment {}", kb_payment_id);
        let response = self
            .send(self.request(reqwest::Method::GET, &format!("payments/{}", kb_payment_id)), &what)
            .await?;
        let json: PaymentJson = Self::decode(response, &what).await?;
        Payment::try_from(json)
    }

    async fn get_account(&self, kb_account_id: &KbAccountId, _context: &CallContext) -> Result<Account, DomainError> {
        let what = format!("account {}", kb_account_id);
        let response = self
            .send(self.request(reqwest::Method::GET, &format!("accounts/{}", kb_account_id)), &what)
            .await?;
        let json: AccountJson = Self::decode(response, &what).await?;
        Ok(Account {
            id: json.account_id,
            external_key: json.external_key,
        })
    }

    async fn notify_pending_transaction_state_changed(
        &self,
        account: &Account,
        kb_transaction_id: &KbTransactionId,
        is_success: bool,
        context: &CallContext,
    ) -> Result<Payment, DomainError> {
        // The endpoint needs the owning payment id alongside the transaction.
        let lookup = format!("paymentTransactions/{}", kb_transaction_id);
        let what = format!("transaction {}", kb_transaction_id);
        let response = self.send(self.request(reqwest::Method::GET, &lookup), &what).await?;
        let current: PaymentJson = Self::decode(response, &what).await?;
        if current.account_id != account.id {
            return Err(DomainError::new(
                ErrorCode::IntegrityViolation,
                format!("transaction {} does not belong to account {}", kb_transaction_id, account.id),
            ));
        }

        let body = StateChangeJson {
            payment_id: current.payment_id,
            transaction_id: kb_transaction_id,
            status: if is_success { "SUCCESS" } else { "PAYMENT_FAILURE" },
        };
        self.send(
            self.request(reqwest::Method::POST, &lookup)
                .header(CREATED_BY_HEADER, &self.config.created_by)
                .json(&body),
            &what,
        )
        .await?;

        tracing::debug!(
            tenant_id = %context.tenant_id,
            kb_transaction_id = %kb_transaction_id,
            is_success,
            "Billing platform notified"
        );
        self.get_payment(&current.payment_id, context).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_json_maps_transactions() {
        let json: PaymentJson = serde_json::from_value(serde_json::json!({
            "paymentId": "3a3a3a3a-0000-4000-8000-000000000001",
            "accountId": "3a3a3a3a-0000-4000-8000-000000000002",
            "transactions": [{
                "transactionId": "3a3a3a3a-0000-4000-8000-000000000003",
                "transactionType": "PURCHASE",
                "status": "PENDING",
                "amount": 25.0,
                "currency": "USD"
            }]
        }))
        .unwrap();

        let payment = Payment::try_from(json).unwrap();
        assert_eq!(payment.transactions.len(), 1);
        assert_eq!(payment.transactions[0].status, TransactionStatus::Pending);
        assert_eq!(payment.transactions[0].transaction_type, TransactionType::Purchase);
    }

    #[test]
    fn unknown_status_maps_to_unknown() {
        assert_eq!(parse_status("success"), TransactionStatus::Success);
        assert_eq!(parse_status("SOMETHING_ELSE"), TransactionStatus::Unknown);
    }
}
