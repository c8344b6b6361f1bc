//! Transfer request and transfer resource snapshot.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::hal::{rel, HalLink, HalLinks};
use super::money::Money;
use crate::domain::billing::{PluginStatus, TransactionType};

/// Status of a transfer as reported by the processor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransferStatus {
    Pending,
    Processed,
    Failed,
    Cancelled,
    Reclaimed,
    /// A status string this adapter does not know about.
    Other(String),
}

impl TransferStatus {
    /// Parses a processor status string, ignoring case.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => TransferStatus::Pending,
            "processed" => TransferStatus::Processed,
            "failed" => TransferStatus::Failed,
            "cancelled" => TransferStatus::Cancelled,
            "reclaimed" => TransferStatus::Reclaimed,
            _ => TransferStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransferStatus::Pending => "pending",
            TransferStatus::Processed => "processed",
            TransferStatus::Failed => "failed",
            TransferStatus::Cancelled => "cancelled",
            TransferStatus::Reclaimed => "reclaimed",
            TransferStatus::Other(raw) => raw,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TransferStatus::Failed)
    }

    /// Status reported to the billing platform for a freshly created transfer.
    pub fn plugin_status(&self) -> PluginStatus {
        match self {
            TransferStatus::Pending => PluginStatus::Pending,
            TransferStatus::Processed => PluginStatus::Processed,
            TransferStatus::Failed | TransferStatus::Cancelled | TransferStatus::Reclaimed => {
                PluginStatus::Error
            }
            TransferStatus::Other(_) => PluginStatus::Undefined,
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TransferStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TransferStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(TransferStatus::parse(&raw))
    }
}

/// Which way funds move for a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    /// Customer funding source to merchant account.
    Collect,
    /// Merchant funding source back to the customer.
    Payout,
}

impl From<TransactionType> for TransferDirection {
    fn from(transaction_type: TransactionType) -> Self {
        match transaction_type {
            TransactionType::Refund => TransferDirection::Payout,
            _ => TransferDirection::Collect,
        }
    }
}

/// A funds-transfer request, built fresh per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub amount: Money,
    pub source: HalLink,
    pub destination: HalLink,
}

impl TransferRequest {
    /// Builds the request, orienting source and destination by direction.
    ///
    /// `merchant_target` is the merchant's account link when collecting and
    /// the merchant's funding-source link when paying out.
    pub fn oriented(
        direction: TransferDirection,
        amount: Money,
        customer_source: HalLink,
        merchant_target: HalLink,
    ) -> Self {
        let (source, destination) = match direction {
            TransferDirection::Collect => (customer_source, merchant_target),
            TransferDirection::Payout => (merchant_target, customer_source),
        };
        Self {
            amount,
            source,
            destination,
        }
    }
}

/// Structured reason a transfer failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferFailure {
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Read-only snapshot of a transfer fetched right after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub id: String,
    pub status: TransferStatus,
    pub links: HalLinks,
    pub amount: Option<Money>,
    pub failure: Option<TransferFailure>,
    /// The resource exactly as returned by the processor.
    pub snapshot: serde_json::Value,
}

impl TransferRecord {
    /// Link to the failure detail, present on failed transfers.
    pub fn failure_link(&self) -> Option<&HalLink> {
        self.links.get(rel::FAILURE)
    }

    pub fn with_failure(mut self, failure: TransferFailure) -> Self {
        self.failure = Some(failure);
        self
    }
}
