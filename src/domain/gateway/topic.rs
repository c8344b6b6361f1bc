//! Webhook topic vocabulary and the status mapper.
//!
//! Two independent mappings are derived from a topic:
//!
//! - [`EventTopic::billing_status`] drives the billing platform's pending
//!   transaction transition. Only completed, failed and cancelled transfer
//!   topics produce a status; everything else is ignored.
//! - [`EventTopic::transfer_status`] is the finer-grained mirror stored in the
//!   response ledger.

use std::fmt;

use super::transfer::TransferStatus;
use crate::domain::billing::PluginStatus;

/// Whether the event concerns the merchant account or one of its customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicScope {
    Account,
    Customer,
}

/// Transfer lifecycle event carried by a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferEvent {
    Created,
    Completed,
    Failed,
    Cancelled,
    Reclaimed,
}

impl TransferEvent {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "created" => Some(TransferEvent::Created),
            "completed" => Some(TransferEvent::Completed),
            "failed" => Some(TransferEvent::Failed),
            "cancelled" => Some(TransferEvent::Cancelled),
            "reclaimed" => Some(TransferEvent::Reclaimed),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TransferEvent::Created => "created",
            TransferEvent::Completed => "completed",
            TransferEvent::Failed => "failed",
            TransferEvent::Cancelled => "cancelled",
            TransferEvent::Reclaimed => "reclaimed",
        }
    }
}

/// A parsed webhook topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventTopic {
    Transfer {
        scope: TopicScope,
        event: TransferEvent,
    },
    /// Any topic not about a transfer lifecycle event.
    Other(String),
}

impl EventTopic {
    /// Parses a topic name such as `customer_transfer_completed`.
    ///
    /// Account-scoped topics are accepted both with and without the
    /// `account_` prefix.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();

        let (scope, rest) = if let Some(rest) = normalized.strip_prefix("customer_transfer_") {
            (TopicScope::Customer, rest)
        } else if let Some(rest) = normalized.strip_prefix("account_transfer_") {
            (TopicScope::Account, rest)
        } else if let Some(rest) = normalized.strip_prefix("transfer_") {
            (TopicScope::Account, rest)
        } else {
            return EventTopic::Other(raw.to_string());
        };

        match TransferEvent::parse(rest) {
            Some(event) => EventTopic::Transfer { scope, event },
            None => EventTopic::Other(raw.to_string()),
        }
    }

    /// Billing-platform status for this topic, `None` when it is irrelevant.
    pub fn billing_status(&self) -> Option<PluginStatus> {
        match self {
            EventTopic::Transfer { event, .. } => match event {
                TransferEvent::Completed => Some(PluginStatus::Processed),
                TransferEvent::Failed | TransferEvent::Cancelled => Some(PluginStatus::Error),
                TransferEvent::Created | TransferEvent::Reclaimed => None,
            },
            EventTopic::Other(_) => None,
        }
    }

    /// Local transfer-status mirror for this topic.
    pub fn transfer_status(&self) -> Option<TransferStatus> {
        match self {
            EventTopic::Transfer { event, .. } => Some(match event {
                TransferEvent::Created => TransferStatus::Pending,
                TransferEvent::Completed => TransferStatus::Processed,
                TransferEvent::Failed => TransferStatus::Failed,
                TransferEvent::Cancelled => TransferStatus::Cancelled,
                TransferEvent::Reclaimed => TransferStatus::Reclaimed,
            }),
            EventTopic::Other(_) => None,
        }
    }
}

impl fmt::Display for EventTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTopic::Transfer { scope, event } => {
                let prefix = match scope {
                    TopicScope::Account => "account",
                    TopicScope::Customer => "customer",
                };
                write!(f, "{}_transfer_{}", prefix, event.as_str())
            }
            EventTopic::Other(raw) => f.write_str(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn completed_topics_map_to_processed() {
        for raw in ["customer_transfer_completed", "account_transfer_completed", "transfer_completed"] {
            assert_eq!(EventTopic::parse(raw).billing_status(), Some(PluginStatus::Processed), "{}", raw);
        }
    }

    #[test]
    fn failed_and_cancelled_topics_map_to_error() {
        for raw in [
            "customer_transfer_failed",
            "account_transfer_failed",
            "customer_transfer_cancelled",
            "ACCOUNT_TRANSFER_CANCELLED",
        ] {
            assert_eq!(EventTopic::parse(raw).billing_status(), Some(PluginStatus::Error), "{}", raw);
        }
    }

    #[test]
    fn created_topic_is_ignored_for_billing_but_mirrored() {
        let topic = EventTopic::parse("customer_transfer_created");
        assert_eq!(topic.billing_status(), None);
        assert_eq!(topic.transfer_status(), Some(TransferStatus::Pending));
    }

    #[test]
    fn unrelated_topics_map_to_nothing() {
        let topic = EventTopic::parse("customer_funding_source_added");
        assert_eq!(topic, EventTopic::Other("customer_funding_source_added".to_string()));
        assert_eq!(topic.billing_status(), None);
        assert_eq!(topic.transfer_status(), None);
    }

    #[test]
    fn customer_bank_transfer_topics_are_not_transfer_topics() {
        let topic = EventTopic::parse("customer_bank_transfer_completed");
        assert_eq!(topic.billing_status(), None);
    }

    #[test]
    fn display_uses_canonical_name() {
        assert_eq!(EventTopic::parse("transfer_failed").to_string(), "account_transfer_failed");
        assert_eq!(
            EventTopic::parse("Customer_Transfer_Completed").to_string(),
            "customer_transfer_completed"
        );
    }

    fn transfer_event() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("created"),
            Just("completed"),
            Just("failed"),
            Just("cancelled"),
            Just("reclaimed"),
        ]
    }

    proptest! {
        #[test]
        fn scope_never_changes_the_mapping(event in transfer_event()) {
            let account = EventTopic::parse(&format!("account_transfer_{}", event));
            let customer = EventTopic::parse(&format!("customer_transfer_{}", event));
            prop_assert_eq!(account.billing_status(), customer.billing_status());
            prop_assert_eq!(account.transfer_status(), customer.transfer_status());
        }

        #[test]
        fn billing_status_implies_transfer_status(raw in "[a-z_]{0,40}") {
            let topic = EventTopic::parse(&raw);
            if topic.billing_status().is_some() {
                prop_assert!(topic.transfer_status().is_some());
            }
        }

        #[test]
        fn billing_status_agrees_with_mirror(event in transfer_event()) {
            let topic = EventTopic::parse(&format!("customer_transfer_{}", event));
            let mirror = topic.transfer_status().map(|s| s.plugin_status());
            if let Some(status) = topic.billing_status() {
                prop_assert_eq!(Some(status), mirror);
            }
        }

        #[test]
        fn parsing_never_panics(raw in ".{0,64}") {
            let _ = EventTopic::parse(&raw).billing_status();
        }
    }
}
