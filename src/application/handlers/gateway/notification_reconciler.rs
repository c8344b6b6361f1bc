//! NotificationReconciler - Applies processor webhooks to billing state.
//!
//! ## Flow
//!
//! 1. Store the notification; a uniqueness conflict means it was already
//!    seen (Duplicate), unless the earlier attempt failed, in which case one
//!    redelivery reclaims it and processes it again.
//! 2. Map the topic to a billing status; no status means Ignored.
//! 3. Find the ledger entry owning the transfer named by the event.
//! 4. If the billing transaction is still pending, settle it (Transitioned),
//!    otherwise leave it alone (NoOp).
//! 5. Mirror the topic's transfer status onto the ledger entry.
//!
//! Every failure after step 1 marks the stored notification as failed and is
//! returned, so the sender redelivers.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::billing::{CallContext, PluginStatus};
use crate::domain::foundation::TenantId;
use crate::domain::gateway::{
    DwollaEvent, GatewayError, NotificationOutcome, ProcessingState, ResponseEntry, WebhookRecord,
};
use crate::ports::{BillingPlatform, NotificationRepository, ResponseRepository, SaveResult};

/// Command to process one webhook delivery.
#[derive(Debug, Clone)]
pub struct ProcessNotificationCommand {
    pub raw_payload: String,
    pub tenant_id: TenantId,
}

pub struct NotificationReconciler {
    notifications: Arc<dyn NotificationRepository>,
    responses: Arc<dyn ResponseRepository>,
    billing: Arc<dyn BillingPlatform>,
}

impl NotificationReconciler {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        responses: Arc<dyn ResponseRepository>,
        billing: Arc<dyn BillingPlatform>,
    ) -> Self {
        Self {
            notifications,
            responses,
            billing,
        }
    }

    pub async fn handle(
        &self,
        cmd: ProcessNotificationCommand,
        context: &CallContext,
    ) -> Result<NotificationOutcome, GatewayError> {
        let event = DwollaEvent::parse(&cmd.raw_payload)?;
        let record = WebhookRecord::received(&event, &cmd.raw_payload, cmd.tenant_id, context.now);

        match self.notifications.insert(&record).await.map_err(GatewayError::Persistence)? {
            SaveResult::Inserted => {}
            SaveResult::AlreadyExists => {
                let reclaimed = self
                    .notifications
                    .reclaim_failed(&event.id, &cmd.tenant_id)
                    .await
                    .map_err(GatewayError::Persistence)?;
                if !reclaimed {
                    info!(
                        tenant_id = %cmd.tenant_id,
                        notification_id = %event.id,
                        topic = %event.topic,
                        "Duplicate notification"
                    );
                    return Ok(NotificationOutcome::Duplicate);
                }
                info!(notification_id = %event.id, "Retrying previously failed notification");
            }
        }

        let result = self.reconcile(&event, &cmd.tenant_id, context).await;

        let (state, error_message) = match &result {
            Ok(NotificationOutcome::Ignored) => (ProcessingState::Ignored, None),
            Ok(_) => (ProcessingState::Processed, None),
            Err(err) => (ProcessingState::Failed, Some(err.to_string())),
        };
        if let Err(err) = self
            .notifications
            .mark(&event.id, &cmd.tenant_id, state, error_message.as_deref())
            .await
        {
            warn!(notification_id = %event.id, error = %err, "Could not record notification state");
        }

        result
    }

    async fn reconcile(
        &self,
        event: &DwollaEvent,
        tenant_id: &TenantId,
        context: &CallContext,
    ) -> Result<NotificationOutcome, GatewayError> {
        let topic = event.topic();
        let Some(billing_status) = topic.billing_status() else {
            debug!(topic = %event.topic, notification_id = %event.id, "Ignoring notification topic");
            return Ok(NotificationOutcome::Ignored);
        };

        let transfer_id = event.transfer_id().ok_or_else(|| {
            GatewayError::InvalidNotification(format!("event {} has no resource link", event.id))
        })?;

        let entry = self
            .responses
            .find_by_transfer_id(transfer_id, tenant_id)
            .await?
            .ok_or_else(|| {
                warn!(tenant_id = %tenant_id, transfer_id = %transfer_id, "No response recorded for transfer");
                GatewayError::UnknownTransfer(transfer_id.to_string())
            })?;

        let outcome = self.settle(&entry, transfer_id, billing_status, context).await?;

        if let Some(mirror) = topic.transfer_status() {
            self.responses.update_status(transfer_id, &mirror, tenant_id).await?;
        }

        Ok(outcome)
    }

    async fn settle(
        &self,
        entry: &ResponseEntry,
        transfer_id: &str,
        billing_status: PluginStatus,
        context: &CallContext,
    ) -> Result<NotificationOutcome, GatewayError> {
        let payment = self
            .billing
            .get_payment(&entry.kb_payment_id, context)
            .await
            .map_err(GatewayError::BillingPlatform)?;

        if payment.account_id != entry.kb_account_id {
            return Err(GatewayError::DataIntegrity(format!(
                "payment {} belongs to account {}, ledger says {}",
                payment.id, payment.account_id, entry.kb_account_id
            )));
        }

        let transaction = payment.find_transaction(&entry.kb_transaction_id).ok_or_else(|| {
            GatewayError::DataIntegrity(format!(
                "transaction {} not found in payment {}",
                entry.kb_transaction_id, payment.id
            ))
        })?;

        let no_op = NotificationOutcome::NoOp {
            kb_payment_id: entry.kb_payment_id,
            transfer_id: transfer_id.to_string(),
        };

        if !transaction.status.is_pending() {
            info!(
                kb_payment_id = %entry.kb_payment_id,
                transfer_id = %transfer_id,
                status = ?transaction.status,
                "Transaction already settled"
            );
            return Ok(no_op);
        }

        let is_success = match billing_status {
            PluginStatus::Processed => true,
            PluginStatus::Error => false,
            _ => return Ok(no_op),
        };

        let account = self
            .billing
            .get_account(&entry.kb_account_id, context)
            .await
            .map_err(GatewayError::BillingPlatform)?;
        self.billing
            .notify_pending_transaction_state_changed(&account, &entry.kb_transaction_id, is_success, context)
            .await
            .map_err(GatewayError::BillingPlatform)?;

        info!(
            kb_payment_id = %entry.kb_payment_id,
            kb_transaction_id = %entry.kb_transaction_id,
            transfer_id = %transfer_id,
            status = %billing_status,
            "Pending transaction settled"
        );

        Ok(NotificationOutcome::Transitioned {
            kb_payment_id: entry.kb_payment_id,
            transfer_id: transfer_id.to_string(),
            status: billing_status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{
        InMemoryBillingPlatform, InMemoryNotificationRepository, InMemoryResponseRepository,
    };
    use crate::domain::billing::{PluginProperty, TransactionStatus, TransactionType};
    use crate::domain::foundation::{KbAccountId, KbPaymentId, KbPaymentMethodId, KbTransactionId, Timestamp};
    use crate::domain::gateway::{Money, TransactionAttempt, TransferRecord, TransferStatus};
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    struct Fixture {
        reconciler: NotificationReconciler,
        notifications: Arc<InMemoryNotificationRepository>,
        responses: Arc<InMemoryResponseRepository>,
        billing: Arc<InMemoryBillingPlatform>,
        tenant: TenantId,
        attempt: TransactionAttempt,
    }

    async fn fixture(transaction_status: TransactionStatus) -> Fixture {
        let tenant = TenantId::new();
        let notifications = Arc::new(InMemoryNotificationRepository::new());
        let responses = Arc::new(InMemoryResponseRepository::new());
        let billing = Arc::new(InMemoryBillingPlatform::new());

        let attempt = TransactionAttempt {
            transaction_type: TransactionType::Purchase,
            kb_account_id: KbAccountId::new(),
            kb_payment_id: KbPaymentId::new(),
            kb_transaction_id: KbTransactionId::new(),
            kb_payment_method_id: KbPaymentMethodId::new(),
            amount: Money::new(Decimal::new(2500, 2), "USD"),
            properties: vec![PluginProperty::new("k", "v")],
            tenant_id: tenant,
        };
        billing.add_transaction(&attempt, transaction_status);

        let transfer = TransferRecord {
            id: "t-1".to_string(),
            status: TransferStatus::Pending,
            links: HashMap::new(),
            amount: None,
            failure: None,
            snapshot: serde_json::json!({}),
        };
        responses.record_success(&attempt, &transfer, Timestamp::now()).await.unwrap();

        let reconciler = NotificationReconciler::new(notifications.clone(), responses.clone(), billing.clone());
        Fixture {
            reconciler,
            notifications,
            responses,
            billing,
            tenant,
            attempt,
        }
    }

    fn payload(id: &str, topic: &str, transfer_id: &str) -> String {
        serde_json::json!({
            "id": id,
            "resourceId": transfer_id,
            "topic": topic,
            "timestamp": "2024-03-01T12:00:00.000Z",
            "_links": {
                "resource": {"href": format!("https://api-sandbox.dwolla.com/transfers/{}", transfer_id)}
            }
        })
        .to_string()
    }

    fn cmd(f: &Fixture, raw: String) -> ProcessNotificationCommand {
        ProcessNotificationCommand {
            raw_payload: raw,
            tenant_id: f.tenant,
        }
    }

    async fn transfer_status(f: &Fixture) -> Option<TransferStatus> {
        f.responses
            .find_by_transfer_id("t-1", &f.tenant)
            .await
            .unwrap()
            .and_then(|e| e.transfer_status)
    }

    #[tokio::test]
    async fn completed_transfer_settles_pending_transaction() {
        let f = fixture(TransactionStatus::Pending).await;

        let outcome = f
            .reconciler
            .handle(cmd(&f, payload("e1", "customer_transfer_completed", "t-1")), &CallContext::new(f.tenant))
            .await
            .unwrap();

        assert!(matches!(outcome, NotificationOutcome::Transitioned { status: PluginStatus::Processed, .. }));
        assert_eq!(f.billing.status_of(&f.attempt.kb_transaction_id), Some(TransactionStatus::Success));
        assert_eq!(transfer_status(&f).await, Some(TransferStatus::Processed));
    }

    #[tokio::test]
    async fn failed_transfer_marks_transaction_failed_once() {
        let f = fixture(TransactionStatus::Pending).await;
        let raw = payload("e1", "customer_transfer_failed", "t-1");
        let ctx = CallContext::new(f.tenant);

        f.reconciler.handle(cmd(&f, raw.clone()), &ctx).await.unwrap();
        let replay = f.reconciler.handle(cmd(&f, raw), &ctx).await.unwrap();

        assert_eq!(replay, NotificationOutcome::Duplicate);
        assert_eq!(f.billing.status_of(&f.attempt.kb_transaction_id), Some(TransactionStatus::PaymentFailure));
        assert_eq!(f.billing.transition_count(), 1);
        assert_eq!(f.notifications.len(), 1);
    }

    #[tokio::test]
    async fn settled_transaction_is_noop_but_mirror_updates() {
        let f = fixture(TransactionStatus::Success).await;

        let outcome = f
            .reconciler
            .handle(cmd(&f, payload("e1", "customer_transfer_completed", "t-1")), &CallContext::new(f.tenant))
            .await
            .unwrap();

        assert!(matches!(outcome, NotificationOutcome::NoOp { .. }));
        assert_eq!(f.billing.transition_count(), 0);
        assert_eq!(transfer_status(&f).await, Some(TransferStatus::Processed));
    }

    #[tokio::test]
    async fn later_conflicting_notification_is_noop() {
        let f = fixture(TransactionStatus::Pending).await;
        let ctx = CallContext::new(f.tenant);

        f.reconciler
            .handle(cmd(&f, payload("e1", "customer_transfer_completed", "t-1")), &ctx)
            .await
            .unwrap();
        let second = f
            .reconciler
            .handle(cmd(&f, payload("e2", "customer_transfer_cancelled", "t-1")), &ctx)
            .await
            .unwrap();

        assert!(matches!(second, NotificationOutcome::NoOp { .. }));
        assert_eq!(f.billing.status_of(&f.attempt.kb_transaction_id), Some(TransactionStatus::Success));
        assert_eq!(transfer_status(&f).await, Some(TransferStatus::Cancelled));
    }

    #[tokio::test]
    async fn irrelevant_topic_is_ignored() {
        let f = fixture(TransactionStatus::Pending).await;

        let outcome = f
            .reconciler
            .handle(cmd(&f, payload("e1", "customer_transfer_created", "t-1")), &CallContext::new(f.tenant))
            .await
            .unwrap();

        assert_eq!(outcome, NotificationOutcome::Ignored);
        assert_eq!(f.billing.transition_count(), 0);
        assert_eq!(f.notifications.state_of("e1", &f.tenant), Some(ProcessingState::Ignored));
    }

    #[tokio::test]
    async fn unknown_transfer_fails_and_can_be_redelivered() {
        let f = fixture(TransactionStatus::Pending).await;
        let raw = payload("e1", "customer_transfer_completed", "t-unknown");
        let ctx = CallContext::new(f.tenant);

        let first = f.reconciler.handle(cmd(&f, raw.clone()), &ctx).await;
        assert!(matches!(first, Err(GatewayError::UnknownTransfer(ref id)) if id == "t-unknown"));
        assert_eq!(f.notifications.state_of("e1", &f.tenant), Some(ProcessingState::Failed));

        // Redelivery is processed again rather than swallowed as a duplicate.
        let second = f.reconciler.handle(cmd(&f, raw), &ctx).await;
        assert!(matches!(second, Err(GatewayError::UnknownTransfer(_))));
    }

    #[tokio::test]
    async fn account_mismatch_is_integrity_violation() {
        let f = fixture(TransactionStatus::Pending).await;
        f.billing.reassign_payment(&f.attempt.kb_payment_id, KbAccountId::new());

        let result = f
            .reconciler
            .handle(cmd(&f, payload("e1", "customer_transfer_completed", "t-1")), &CallContext::new(f.tenant))
            .await;

        assert!(matches!(result, Err(GatewayError::DataIntegrity(_))));
        assert_eq!(f.billing.transition_count(), 0);
    }

    #[tokio::test]
    async fn missing_payment_is_billing_platform_error() {
        let f = fixture(TransactionStatus::Pending).await;
        f.billing.remove_payment(&f.attempt.kb_payment_id);

        let result = f
            .reconciler
            .handle(cmd(&f, payload("e1", "customer_transfer_completed", "t-1")), &CallContext::new(f.tenant))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, GatewayError::BillingPlatform(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_before_storage() {
        let f = fixture(TransactionStatus::Pending).await;

        let result = f
            .reconciler
            .handle(cmd(&f, "not json".to_string()), &CallContext::new(f.tenant))
            .await;

        assert!(matches!(result, Err(GatewayError::InvalidNotification(_))));
        assert_eq!(f.notifications.len(), 0);
    }
}
