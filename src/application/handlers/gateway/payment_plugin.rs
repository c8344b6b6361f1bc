//! PaymentPluginApi - The surface exposed to the billing platform host.
//!
//! The processor only moves money; it has no authorization hold, capture
//! step or cancellation. Authorize, capture, void and credit therefore
//! answer UNDEFINED without calling it. Purchases and refunds run the
//! transfer executor.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::billing::{CallContext, PluginProperty, TransactionType};
use crate::domain::foundation::{KbAccountId, KbPaymentId, KbPaymentMethodId, KbTransactionId};
use crate::domain::gateway::{
    GatewayError, GatewayNotification, Money, TransactionAttempt, TransactionOutcome,
};
use crate::ports::ResponseRepository;

use super::notification_reconciler::{NotificationReconciler, ProcessNotificationCommand};
use super::transfer_executor::TransferExecutor;

/// A payment operation requested by the billing platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub kb_account_id: KbAccountId,
    pub kb_payment_id: KbPaymentId,
    pub kb_transaction_id: KbTransactionId,
    pub kb_payment_method_id: KbPaymentMethodId,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default)]
    pub properties: Vec<PluginProperty>,
}

impl PaymentRequest {
    fn money(&self) -> Option<Money> {
        match (&self.amount, &self.currency) {
            (Some(value), Some(currency)) => Some(Money::new(*value, currency.clone())),
            _ => None,
        }
    }

    fn into_attempt(self, transaction_type: TransactionType, context: &CallContext) -> Result<TransactionAttempt, GatewayError> {
        let amount = self.money().ok_or_else(|| {
            GatewayError::InvalidRequest(format!("{} requires an amount and a currency", transaction_type))
        })?;
        Ok(TransactionAttempt {
            transaction_type,
            kb_account_id: self.kb_account_id,
            kb_payment_id: self.kb_payment_id,
            kb_transaction_id: self.kb_transaction_id,
            kb_payment_method_id: self.kb_payment_method_id,
            amount,
            properties: self.properties,
            tenant_id: context.tenant_id,
        })
    }
}

/// Hosted payment page descriptor. The processor offers none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormDescriptor {
    pub form_url: String,
    pub form_fields: Vec<PluginProperty>,
}

pub struct PaymentPluginApi {
    executor: Arc<TransferExecutor>,
    reconciler: Arc<NotificationReconciler>,
    responses: Arc<dyn ResponseRepository>,
}

impl PaymentPluginApi {
    pub fn new(
        executor: Arc<TransferExecutor>,
        reconciler: Arc<NotificationReconciler>,
        responses: Arc<dyn ResponseRepository>,
    ) -> Self {
        Self {
            executor,
            reconciler,
            responses,
        }
    }

    /// Dispatches on the transaction type.
    pub async fn execute(
        &self,
        transaction_type: TransactionType,
        request: PaymentRequest,
        context: &CallContext,
    ) -> Result<TransactionOutcome, GatewayError> {
        match transaction_type {
            TransactionType::Purchase | TransactionType::Refund => {
                let attempt = request.into_attempt(transaction_type, context)?;
                self.executor.execute(attempt, context).await
            }
            TransactionType::Authorize
            | TransactionType::Capture
            | TransactionType::Void
            | TransactionType::Credit => Ok(TransactionOutcome::undefined(
                transaction_type,
                request.kb_payment_id,
                request.kb_transaction_id,
                request.money().as_ref(),
                request.properties,
                context.now,
            )),
        }
    }

    pub async fn authorize(&self, request: PaymentRequest, context: &CallContext) -> Result<TransactionOutcome, GatewayError> {
        self.execute(TransactionType::Authorize, request, context).await
    }

    pub async fn capture(&self, request: PaymentRequest, context: &CallContext) -> Result<TransactionOutcome, GatewayError> {
        self.execute(TransactionType::Capture, request, context).await
    }

    pub async fn purchase(&self, request: PaymentRequest, context: &CallContext) -> Result<TransactionOutcome, GatewayError> {
        self.execute(TransactionType::Purchase, request, context).await
    }

    pub async fn void(&self, request: PaymentRequest, context: &CallContext) -> Result<TransactionOutcome, GatewayError> {
        self.execute(TransactionType::Void, request, context).await
    }

    pub async fn credit(&self, request: PaymentRequest, context: &CallContext) -> Result<TransactionOutcome, GatewayError> {
        self.execute(TransactionType::Credit, request, context).await
    }

    pub async fn refund(&self, request: PaymentRequest, context: &CallContext) -> Result<TransactionOutcome, GatewayError> {
        self.execute(TransactionType::Refund, request, context).await
    }

    pub fn build_form_descriptor(
        &self,
        _kb_account_id: &KbAccountId,
        _properties: &[PluginProperty],
        _context: &CallContext,
    ) -> Option<FormDescriptor> {
        None
    }

    pub async fn process_notification(
        &self,
        raw_payload: &str,
        context: &CallContext,
    ) -> Result<GatewayNotification, GatewayError> {
        let outcome = self
            .reconciler
            .handle(
                ProcessNotificationCommand {
                    raw_payload: raw_payload.to_string(),
                    tenant_id: context.tenant_id,
                },
                context,
            )
            .await?;
        Ok(GatewayNotification::acknowledged(outcome, raw_payload))
    }

    /// Ledger entries of a payment, as outcomes.
    pub async fn get_payment_info(
        &self,
        kb_payment_id: &KbPaymentId,
        context: &CallContext,
    ) -> Result<Vec<TransactionOutcome>, GatewayError> {
        let entries = self
            .responses
            .find_by_payment_id(kb_payment_id, &context.tenant_id)
            .await?;
        Ok(entries.iter().map(TransactionOutcome::from_entry).collect())
    }
}
