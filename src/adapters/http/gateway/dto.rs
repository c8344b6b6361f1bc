//! Request and response bodies for the gateway HTTP surface.

use serde::{Deserialize, Serialize};

use crate::domain::billing::PluginProperty;
use crate::domain::foundation::KbPaymentId;
use crate::domain::gateway::{GatewayNotification, TransactionOutcome};

/// Error body returned by every failing endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub error_code: String,
    /// Human-readable error message.
    pub message: String,
    /// Whether the caller may repeat the same request.
    #[serde(default)]
    pub retryable: bool,
}

impl ErrorResponse {
    pub fn new(error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            message: message.into(),
            retryable: false,
        }
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }
}

/// Acknowledgement body for a webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAckResponse {
    pub kb_payment_id: Option<KbPaymentId>,
    pub outcome: String,
    pub properties: Vec<PluginProperty>,
}

impl From<GatewayNotification> for NotificationAckResponse {
    fn from(notification: GatewayNotification) -> Self {
        Self {
            kb_payment_id: notification.kb_payment_id,
            outcome: notification.outcome.as_str().to_string(),
            // The raw payload is already known to the sender.
            properties: notification
                .properties
                .into_iter()
                .filter(|p| p.key != "payload")
                .collect(),
        }
    }
}

/// Every recorded transaction of one payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfoResponse {
    pub kb_payment_id: KbPaymentId,
    pub transactions: Vec<TransactionOutcome>,
}
