//! TransferExecutor - Moves funds for purchases and refunds.
//!
//! Builds a transfer request oriented by the transaction direction, submits
//! it, fetches the created transfer and writes exactly one ledger entry for
//! the attempt.
//!
//! ## Failure classes
//!
//! - Processor refuses the request: recorded as a failed entry and returned
//!   as an ERROR outcome. Not an error for the caller.
//! - Connectivity or processor outage before a transfer exists: recorded as
//!   a failed entry, then returned as a retryable [`GatewayError::Remote`].
//!   The retry reuses the transaction id as idempotency key, so it cannot
//!   create a second transfer, and its entry replaces the failed one.
//! - Credential rejected after the initial check: refreshed through the token guard
//!   and the remote part retried once. Never turned into an ERROR outcome.
//! - Ledger write fails after the transfer exists:
//!   [`GatewayError::StateInconsistency`]. Money has moved; never retried.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::billing::CallContext;
use crate::domain::gateway::{
    rel, AccessToken, GatewayError, HalLink, PaymentMethodRecord, RejectionDetail,
    TransactionAttempt, TransactionOutcome, TransferDirection, TransferRecord, TransferRequest,
    TransferStatus,
};
use crate::ports::{PaymentMethodRepository, ProviderError, ResponseRepository, TransferApi};

use super::token_guard::TokenGuard;

/// How the merchant funding source paying out refunds is chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MerchantFundingSourcePolicy {
    /// Always use this funding source id.
    Configured(String),
    /// First non-removed source in the merchant account's listing.
    FirstActive,
}

/// What the processor did with a transfer request.
#[derive(Debug, Clone, PartialEq)]
pub enum TransferExecution {
    Executed(TransferRecord),
    Rejected(RejectionDetail),
}

impl From<&ProviderError> for RejectionDetail {
    fn from(err: &ProviderError) -> Self {
        RejectionDetail {
            code: err.code.clone(),
            message: err.message.clone(),
        }
    }
}

pub struct TransferExecutor {
    token_guard: Arc<TokenGuard>,
    api: Arc<dyn TransferApi>,
    payment_methods: Arc<dyn PaymentMethodRepository>,
    responses: Arc<dyn ResponseRepository>,
    merchant_policy: MerchantFundingSourcePolicy,
}

impl TransferExecutor {
    pub fn new(
        token_guard: Arc<TokenGuard>,
        api: Arc<dyn TransferApi>,
        payment_methods: Arc<dyn PaymentMethodRepository>,
        responses: Arc<dyn ResponseRepository>,
        merchant_policy: MerchantFundingSourcePolicy,
    ) -> Self {
        Self {
            token_guard,
            api,
            payment_methods,
            responses,
            merchant_policy,
        }
    }

    pub async fn execute(
        &self,
        attempt: TransactionAttempt,
        context: &CallContext,
    ) -> Result<TransactionOutcome, GatewayError> {
        let token = self.token_guard.ensure_valid_token(&attempt.tenant_id).await?;

        let method = self
            .payment_methods
            .find_by_payment_method(&attempt.kb_payment_method_id, &attempt.tenant_id)
            .await?
            .ok_or(GatewayError::PaymentMethodNotFound(attempt.kb_payment_method_id))?;

        let execution = match self.run_transfer(token, &attempt, &method).await {
            Ok(execution) => execution,
            Err(GatewayError::Remote(err)) => {
                self.record_outage(&attempt, &err, context).await;
                return Err(GatewayError::Remote(err));
            }
            Err(other) => return Err(other),
        };

        match execution {
            TransferExecution::Executed(transfer) => {
                let entry = self
                    .responses
                    .record_success(&attempt, &transfer, context.now)
                    .await
                    .map_err(|source| {
                        error!(
                            tenant_id = %attempt.tenant_id,
                            kb_payment_id = %attempt.kb_payment_id,
                            kb_transaction_id = %attempt.kb_transaction_id,
                            transfer_id = %transfer.id,
                            snapshot = %transfer.snapshot,
                            error = %source,
                            "Payment went through, but recording it failed"
                        );
                        GatewayError::StateInconsistency {
                            transfer_id: transfer.id.clone(),
                            source,
                        }
                    })?;

                info!(
                    tenant_id = %attempt.tenant_id,
                    kb_payment_id = %attempt.kb_payment_id,
                    transfer_id = %transfer.id,
                    status = %transfer.status,
                    "Transfer created"
                );
                Ok(TransactionOutcome::from_entry(&entry))
            }
            TransferExecution::Rejected(rejection) => {
                warn!(
                    tenant_id = %attempt.tenant_id,
                    kb_payment_id = %attempt.kb_payment_id,
                    code = ?rejection.code,
                    message = %rejection.message,
                    "Transfer rejected"
                );
                match self.responses.record_failure(&attempt, &rejection, context.now).await {
                    Ok(entry) => Ok(TransactionOutcome::from_entry(&entry)),
                    Err(err) => {
                        error!(
                            tenant_id = %attempt.tenant_id,
                            kb_payment_id = %attempt.kb_payment_id,
                            error = %err,
                            "Could not record transfer rejection"
                        );
                        Ok(TransactionOutcome::rejected(&attempt, &rejection, context.now))
                    }
                }
            }
        }
    }

    /// Performs the remote part of the operation.
    ///
    /// A rejected credential is refreshed and the submission retried once.
    /// Non-retryable processor errors become a rejection; everything else
    /// propagates.
    async fn run_transfer(
        &self,
        token: AccessToken,
        attempt: &TransactionAttempt,
        method: &PaymentMethodRecord,
    ) -> Result<TransferExecution, GatewayError> {
        let result = match self.submit(&token, attempt, method).await {
            Err(GatewayError::Remote(err)) if err.is_auth_failure() => {
                let fresh = self
                    .token_guard
                    .refresh_after_rejection(&attempt.tenant_id, &token)
                    .await?;
                self.submit(&fresh, attempt, method).await
            }
            other => other,
        };

        match result {
            Ok(transfer) => Ok(TransferExecution::Executed(transfer)),
            Err(GatewayError::Remote(err)) if !err.is_retryable() && !err.is_auth_failure() => {
                Ok(TransferExecution::Rejected(RejectionDetail::from(&err)))
            }
            Err(other) => Err(other),
        }
    }

    /// Records a remote failure that left no transfer behind. The caller's
    /// error is returned regardless of the outcome of this write.
    async fn record_outage(&self, attempt: &TransactionAttempt, err: &ProviderError, context: &CallContext) {
        warn!(
            tenant_id = %attempt.tenant_id,
            kb_payment_id = %attempt.kb_payment_id,
            kind = %err.kind,
            error = %err,
            "Transfer not created"
        );
        if let Err(write_err) = self
            .responses
            .record_failure(attempt, &RejectionDetail::from(err), context.now)
            .await
        {
            error!(
                tenant_id = %attempt.tenant_id,
                kb_payment_id = %attempt.kb_payment_id,
                error = %write_err,
                "Could not record failed transfer attempt"
            );
        }
    }

    async fn submit(
        &self,
        token: &AccessToken,
        attempt: &TransactionAttempt,
        method: &PaymentMethodRecord,
    ) -> Result<TransferRecord, GatewayError> {
        let customer_source = self.funding_source_link(token, &method.funding_source_id).await?;

        let direction = TransferDirection::from(attempt.transaction_type);
        let merchant_target = match direction {
            TransferDirection::Collect => self.merchant_account_link(token).await?,
            TransferDirection::Payout => self.merchant_funding_source_link(token).await?,
        };

        let request = TransferRequest::oriented(direction, attempt.amount.clone(), customer_source, merchant_target);
        let location = self
            .api
            .create_transfer(token, &request, &attempt.kb_transaction_id.to_string())
            .await
            .map_err(GatewayError::Remote)?;

        Ok(self.fetch_created(token, &location).await)
    }

    async fn funding_source_link(&self, token: &AccessToken, id: &str) -> Result<HalLink, GatewayError> {
        let source = self
            .api
            .get_funding_source(token, id)
            .await
            .map_err(GatewayError::Remote)?;
        source.self_link().cloned().ok_or_else(|| {
            GatewayError::Remote(ProviderError::decode(format!(
                "funding source {} has no self link",
                id
            )))
        })
    }

    async fn merchant_account_link(&self, token: &AccessToken) -> Result<HalLink, GatewayError> {
        let root = self.api.root(token).await.map_err(GatewayError::Remote)?;
        root.account_link()
            .cloned()
            .ok_or_else(|| GatewayError::MerchantSetup("API root has no account link".to_string()))
    }

    async fn merchant_funding_source_link(&self, token: &AccessToken) -> Result<HalLink, GatewayError> {
        match &self.merchant_policy {
            MerchantFundingSourcePolicy::Configured(id) => self.funding_source_link(token, id).await,
            MerchantFundingSourcePolicy::FirstActive => {
                let account = self.merchant_account_link(token).await?;
                let listing = self
                    .api
                    .list_account_funding_sources(token, &account.href)
                    .await
                    .map_err(GatewayError::Remote)?;
                let first = listing.first_active().ok_or_else(|| {
                    GatewayError::MerchantSetup("merchant account has no active funding source".to_string())
                })?;
                first.self_link().cloned().ok_or_else(|| {
                    GatewayError::MerchantSetup(format!("funding source {} has no self link", first.id))
                })
            }
        }
    }

    /// Fetches the transfer just created. The transfer exists at this point,
    /// so a failed fetch degrades to a pending placeholder instead of an error.
    async fn fetch_created(&self, token: &AccessToken, location: &str) -> TransferRecord {
        let transfer = match self.api.get_transfer(token, location).await {
            Ok(transfer) => transfer,
            Err(err) => {
                warn!(location = %location, error = %err, "Could not fetch created transfer");
                return placeholder_transfer(location);
            }
        };

        if !transfer.status.is_failed() {
            return transfer;
        }

        match self.api.get_transfer_failure(token, &transfer.id).await {
            Ok(failure) => transfer.with_failure(failure),
            Err(err) => {
                warn!(transfer_id = %transfer.id, error = %err, "Could not fetch transfer failure detail");
                transfer
            }
        }
    }
}

fn placeholder_transfer(location: &str) -> TransferRecord {
    let link = HalLink::new(location);
    let id = link.id().unwrap_or(location).to_string();
    let mut links = std::collections::HashMap::new();
    links.insert(rel::SELF.to_string(), link);

    TransferRecord {
        id,
        status: TransferStatus::Pending,
        links,
        amount: None,
        failure: None,
        snapshot: serde_json::json!({ "_links": { "self": { "href": location } } }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dwolla::MockTransferApi;
    use crate::adapters::memory::{
        InMemoryPaymentMethodRepository, InMemoryResponseRepository, InMemoryTokenRepository,
    };
    use crate::domain::billing::{PluginProperty, PluginStatus, TransactionType};
    use crate::domain::foundation::{
        KbAccountId, KbPaymentId, KbPaymentMethodId, KbTransactionId, TenantId,
    };
    use crate::domain::gateway::{Money, TokenPair, TransferFailure};
    use crate::ports::{ProviderErrorKind, TokenRepository};
    use rust_decimal::Decimal;

    struct Fixture {
        executor: TransferExecutor,
        api: Arc<MockTransferApi>,
        responses: Arc<InMemoryResponseRepository>,
        tenant: TenantId,
        method: KbPaymentMethodId,
    }

    async fn fixture(policy: MerchantFundingSourcePolicy) -> Fixture {
        let tenant = TenantId::new();
        let tokens = Arc::new(InMemoryTokenRepository::new());
        tokens.save(&TokenPair::new(tenant, "access", "refresh")).await.unwrap();

        let method = KbPaymentMethodId::new();
        let methods = Arc::new(InMemoryPaymentMethodRepository::new());
        methods
            .save(&PaymentMethodRecord::new(tenant, KbAccountId::new(), method, "customer-fs"))
            .await
            .unwrap();

        let api = Arc::new(MockTransferApi::new());
        api.add_funding_source("customer-fs", false);
        api.add_merchant_funding_source("merchant-removed", true);
        api.add_merchant_funding_source("merchant-fs", false);

        let responses = Arc::new(InMemoryResponseRepository::new());
        let guard = Arc::new(TokenGuard::new(tokens, api.clone()));
        let executor = TransferExecutor::new(guard, api.clone(), methods, responses.clone(), policy);

        Fixture {
            executor,
            api,
            responses,
            tenant,
            method,
        }
    }

    fn attempt(f: &Fixture, transaction_type: TransactionType, cents: i64) -> TransactionAttempt {
        TransactionAttempt {
            transaction_type,
            kb_account_id: KbAccountId::new(),
            kb_payment_id: KbPaymentId::new(),
            kb_transaction_id: KbTransactionId::new(),
            kb_payment_method_id: f.method,
            amount: Money::new(Decimal::new(cents, 2), "USD"),
            properties: vec![PluginProperty::new("origin", "test")],
            tenant_id: f.tenant,
        }
    }

    // ══════════════════════════════════════════════════════════════
    // Purchases
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn purchase_records_entry_and_returns_transfer_id() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        let a = attempt(&f, TransactionType::Purchase, 2500);

        let outcome = f.executor.execute(a.clone(), &CallContext::new(f.tenant)).await.unwrap();

        let created = f.api.created_transfers();
        assert_eq!(created.len(), 1);
        let transfer_id = outcome.first_reference_id.clone().unwrap();
        assert_eq!(outcome.status, PluginStatus::Pending);

        let entry = f.responses.find_by_transfer_id(&transfer_id, &f.tenant).await.unwrap().unwrap();
        assert_eq!(entry.kb_transaction_id, a.kb_transaction_id);
        assert_eq!(entry.transfer_status, Some(TransferStatus::Pending));
        assert_eq!(f.responses.len(), 1);
    }

    #[tokio::test]
    async fn purchase_sends_customer_funds_to_merchant_account() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;

        f.executor
            .execute(attempt(&f, TransactionType::Purchase, 2500), &CallContext::new(f.tenant))
            .await
            .unwrap();

        let (request, key) = f.api.created_transfers().remove(0);
        assert!(request.source.href.ends_with("/funding-sources/customer-fs"));
        assert_eq!(request.destination.href, f.api.merchant_account_href());
        assert_eq!(request.amount.value.to_string(), "25.00");
        assert!(!key.is_empty());
    }

    #[tokio::test]
    async fn failed_transfer_fetches_failure_detail() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        f.api.set_created_status("failed");
        f.api.set_failure(TransferFailure {
            code: "R01".to_string(),
            description: "Insufficient Funds".to_string(),
            explanation: None,
        });

        let outcome = f
            .executor
            .execute(attempt(&f, TransactionType::Purchase, 100), &CallContext::new(f.tenant))
            .await
            .unwrap();

        assert_eq!(outcome.status, PluginStatus::Error);
        assert_eq!(outcome.gateway_error_code.as_deref(), Some("R01"));
    }

    // ══════════════════════════════════════════════════════════════
    // Refunds
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn refund_pays_out_from_first_active_merchant_source() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;

        f.executor
            .execute(attempt(&f, TransactionType::Refund, 1000), &CallContext::new(f.tenant))
            .await
            .unwrap();

        let (request, _) = f.api.created_transfers().remove(0);
        assert!(request.source.href.ends_with("/funding-sources/merchant-fs"));
        assert!(request.destination.href.ends_with("/funding-sources/customer-fs"));
    }

    #[tokio::test]
    async fn refund_uses_configured_merchant_source() {
        let f = fixture(MerchantFundingSourcePolicy::Configured("merchant-removed".to_string())).await;

        f.executor
            .execute(attempt(&f, TransactionType::Refund, 1000), &CallContext::new(f.tenant))
            .await
            .unwrap();

        let (request, _) = f.api.created_transfers().remove(0);
        assert!(request.source.href.ends_with("/funding-sources/merchant-removed"));
    }

    // ══════════════════════════════════════════════════════════════
    // Failures
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unknown_payment_method_is_hard_error() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        let mut a = attempt(&f, TransactionType::Purchase, 100);
        a.kb_payment_method_id = KbPaymentMethodId::new();

        let result = f.executor.execute(a, &CallContext::new(f.tenant)).await;

        assert!(matches!(result, Err(GatewayError::PaymentMethodNotFound(_))));
        assert_eq!(f.responses.len(), 0);
    }

    #[tokio::test]
    async fn rejection_is_recorded_and_returned_as_error_outcome() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        f.api.fail_create_once(ProviderError::from_response(
            400,
            r#"{"code":"ValidationError","message":"Validation error(s) present.","_embedded":{"errors":[{"code":"Invalid","message":"Receiver cannot be the sender."}]}}"#,
        ));

        let outcome = f
            .executor
            .execute(attempt(&f, TransactionType::Purchase, 100), &CallContext::new(f.tenant))
            .await
            .unwrap();

        assert_eq!(outcome.status, PluginStatus::Error);
        assert_eq!(outcome.gateway_error_code.as_deref(), Some("ValidationError"));
        assert!(outcome.gateway_error.unwrap().contains("Receiver cannot be the sender"));
        assert!(outcome.first_reference_id.is_none());
        assert_eq!(f.responses.len(), 1);
    }

    #[tokio::test]
    async fn network_failure_before_transfer_is_retryable_and_recorded() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        f.api.fail_create_once(ProviderError::new(ProviderErrorKind::Network, "reset"));
        let a = attempt(&f, TransactionType::Purchase, 100);

        let result = f.executor.execute(a.clone(), &CallContext::new(f.tenant)).await;

        let err = result.unwrap_err();
        assert!(err.is_retryable());
        let entries = f.responses.find_by_payment_id(&a.kb_payment_id, &f.tenant).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_rejection());
        assert_eq!(entries[0].error_message.as_deref(), Some("reset"));
    }

    #[tokio::test]
    async fn retry_after_outage_replaces_failed_entry() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        f.api.fail_create_once(ProviderError::from_response(503, "Service Unavailable"));
        let a = attempt(&f, TransactionType::Purchase, 100);
        let ctx = CallContext::new(f.tenant);

        assert!(f.executor.execute(a.clone(), &ctx).await.is_err());
        let outcome = f.executor.execute(a, &ctx).await.unwrap();

        assert_eq!(outcome.status, PluginStatus::Pending);
        assert_eq!(f.responses.len(), 1);
        let transfer_id = outcome.first_reference_id.unwrap();
        assert!(f.responses.find_by_transfer_id(&transfer_id, &f.tenant).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn repeated_attempt_returns_same_transfer_with_one_entry() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        let a = attempt(&f, TransactionType::Purchase, 2500);
        let ctx = CallContext::new(f.tenant);

        let first = f.executor.execute(a.clone(), &ctx).await.unwrap();
        let second = f.executor.execute(a, &ctx).await.unwrap();

        assert_eq!(first.first_reference_id, second.first_reference_id);
        assert_eq!(f.api.created_transfers().len(), 1);
        assert_eq!(f.responses.len(), 1);
        let transfer_id = first.first_reference_id.unwrap();
        assert!(f.responses.find_by_transfer_id(&transfer_id, &f.tenant).await.is_ok());
    }

    #[tokio::test]
    async fn expired_token_on_create_is_refreshed_and_retried() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        f.api.fail_create_once(ProviderError::from_response(
            401,
            r#"{"code":"ExpiredAccessToken","message":"Access token is expired."}"#,
        ));

        let outcome = f
            .executor
            .execute(attempt(&f, TransactionType::Purchase, 100), &CallContext::new(f.tenant))
            .await
            .unwrap();

        assert_eq!(outcome.status, PluginStatus::Pending);
        assert!(outcome.gateway_error_code.is_none());
        assert_eq!(f.api.refresh_calls(), 1);
        assert_eq!(f.api.created_transfers().len(), 1);
    }

    #[tokio::test]
    async fn repeated_auth_failure_is_never_a_rejection() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        for _ in 0..2 {
            f.api.fail_create_once(ProviderError::from_response(
                401,
                r#"{"code":"InvalidAccessToken","message":"Invalid access token."}"#,
            ));
        }

        let result = f
            .executor
            .execute(attempt(&f, TransactionType::Purchase, 100), &CallContext::new(f.tenant))
            .await;

        assert!(matches!(result, Err(GatewayError::Remote(ref e)) if e.is_auth_failure()));
        assert!(f.api.created_transfers().is_empty());
    }

    #[tokio::test]
    async fn ledger_failure_after_transfer_is_state_inconsistency() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        f.responses.fail_next_write();

        let result = f
            .executor
            .execute(attempt(&f, TransactionType::Purchase, 100), &CallContext::new(f.tenant))
            .await;

        assert!(matches!(result, Err(GatewayError::StateInconsistency { .. })));
        assert_eq!(f.api.created_transfers().len(), 1);
    }

    #[tokio::test]
    async fn ledger_failure_after_rejection_still_returns_outcome() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        f.api.fail_create_once(ProviderError::from_response(400, r#"{"code":"ValidationError","message":"nope"}"#));
        f.responses.fail_next_write();

        let outcome = f
            .executor
            .execute(attempt(&f, TransactionType::Purchase, 100), &CallContext::new(f.tenant))
            .await
            .unwrap();

        assert_eq!(outcome.status, PluginStatus::Error);
        assert_eq!(outcome.gateway_error.as_deref(), Some("nope"));
    }

    #[tokio::test]
    async fn unreadable_created_transfer_is_recorded_as_pending() {
        let f = fixture(MerchantFundingSourcePolicy::FirstActive).await;
        f.api.fail_get_transfer_once(ProviderError::network("timeout"));

        let outcome = f
            .executor
            .execute(attempt(&f, TransactionType::Purchase, 100), &CallContext::new(f.tenant))
            .await
            .unwrap();

        assert_eq!(outcome.status, PluginStatus::Pending);
        let transfer_id = outcome.first_reference_id.unwrap();
        assert!(f.responses.find_by_transfer_id(&transfer_id, &f.tenant).await.unwrap().is_some());
    }

    #[test]
    fn placeholder_takes_id_from_location() {
        let record = placeholder_transfer("https://api-sandbox.dwolla.com/transfers/abc-123");
        assert_eq!(record.id, "abc-123");
        assert_eq!(record.status, TransferStatus::Pending);
    }
}
