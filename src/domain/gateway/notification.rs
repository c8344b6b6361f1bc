//! Inbound webhook events and their processing records.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::GatewayError;
use super::hal::{rel, HalLink, HalLinks};
use super::topic::EventTopic;
use crate::domain::billing::{PluginProperty, PluginStatus};
use crate::domain::foundation::{KbPaymentId, TenantId, Timestamp};

/// A webhook event as delivered by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DwollaEvent {
    pub id: String,
    #[serde(rename = "resourceId", default)]
    pub resource_id: Option<String>,
    pub topic: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(rename = "_links", default)]
    pub links: HalLinks,
}

impl DwollaEvent {
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let event: DwollaEvent = serde_json::from_str(raw)
            .map_err(|e| GatewayError::InvalidNotification(e.to_string()))?;
        if event.id.trim().is_empty() {
            return Err(GatewayError::InvalidNotification("event id is empty".to_string()));
        }
        Ok(event)
    }

    pub fn topic(&self) -> EventTopic {
        EventTopic::parse(&self.topic)
    }

    pub fn resource_link(&self) -> Option<&HalLink> {
        self.links.get(rel::RESOURCE)
    }

    /// Transfer id taken from the embedded resource link.
    pub fn transfer_id(&self) -> Option<&str> {
        self.resource_link().and_then(HalLink::id)
    }
}

/// Processing state of a stored notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessingState {
    Received,
    Processed,
    Ignored,
    Failed,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Received => "received",
            ProcessingState::Processed => "processed",
            ProcessingState::Ignored => "ignored",
            ProcessingState::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "received" => Some(ProcessingState::Received),
            "processed" => Some(ProcessingState::Processed),
            "ignored" => Some(ProcessingState::Ignored),
            "failed" => Some(ProcessingState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored notification, unique on (notification_id, tenant_id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookRecord {
    pub notification_id: String,
    pub topic: String,
    pub resource_href: Option<String>,
    pub raw_payload: String,
    pub state: ProcessingState,
    pub error_message: Option<String>,
    pub received_at: Timestamp,
    pub tenant_id: TenantId,
}

impl WebhookRecord {
    pub fn received(event: &DwollaEvent, raw_payload: &str, tenant_id: TenantId, now: Timestamp) -> Self {
        Self {
            notification_id: event.id.clone(),
            topic: event.topic.clone(),
            resource_href: event.resource_link().map(|l| l.href.clone()),
            raw_payload: raw_payload.to_string(),
            state: ProcessingState::Received,
            error_message: None,
            received_at: now,
            tenant_id,
        }
    }
}

/// Terminal state reached by the reconciler for one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Already seen; nothing done.
    Duplicate,
    /// Topic carries no billing status.
    Ignored,
    /// Billing transaction was no longer pending; only the ledger mirror changed.
    NoOp {
        kb_payment_id: KbPaymentId,
        transfer_id: String,
    },
    /// Pending billing transaction was settled.
    Transitioned {
        kb_payment_id: KbPaymentId,
        transfer_id: String,
        status: PluginStatus,
    },
}

impl NotificationOutcome {
    pub fn kb_payment_id(&self) -> Option<KbPaymentId> {
        match self {
            NotificationOutcome::NoOp { kb_payment_id, .. }
            | NotificationOutcome::Transitioned { kb_payment_id, .. } => Some(*kb_payment_id),
            NotificationOutcome::Duplicate | NotificationOutcome::Ignored => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationOutcome::Duplicate => "duplicate",
            NotificationOutcome::Ignored => "ignored",
            NotificationOutcome::NoOp { .. } => "no_op",
            NotificationOutcome::Transitioned { .. } => "transitioned",
        }
    }
}

/// Acknowledgement returned to the host for a processed notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayNotification {
    pub kb_payment_id: Option<KbPaymentId>,
    /// HTTP status the host should answer the sender with.
    pub status: u16,
    pub entity: Option<String>,
    pub outcome: NotificationOutcome,
    pub properties: Vec<PluginProperty>,
}

impl GatewayNotification {
    pub fn acknowledged(outcome: NotificationOutcome, raw_payload: &str) -> Self {
        Self {
            kb_payment_id: outcome.kb_payment_id(),
            status: 200,
            entity: None,
            properties: vec![
                PluginProperty::new("outcome", outcome.as_str()),
                PluginProperty::new("payload", raw_payload),
            ],
            outcome,
        }
    }
}
