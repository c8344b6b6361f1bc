//! Billing-platform payment and transaction model.
//!
//! These are read-only views of state owned by the billing platform. The
//! gateway only inspects them to locate a transaction and check whether it
//! is still awaiting asynchronous confirmation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    KbAccountId, KbPaymentId, KbTransactionId, StateMachine, ValidationError,
};

/// Kind of payment transaction requested by the billing platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Authorize,
    Capture,
    Purchase,
    Void,
    Credit,
    Refund,
}

impl TransactionType {
    /// Returns the canonical upper-case name used in storage and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Authorize => "AUTHORIZE",
            TransactionType::Capture => "CAPTURE",
            TransactionType::Purchase => "PURCHASE",
            TransactionType::Void => "VOID",
            TransactionType::Credit => "CREDIT",
            TransactionType::Refund => "REFUND",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AUTHORIZE" => Ok(TransactionType::Authorize),
            "CAPTURE" => Ok(TransactionType::Capture),
            "PURCHASE" => Ok(TransactionType::Purchase),
            "VOID" => Ok(TransactionType::Void),
            "CREDIT" => Ok(TransactionType::Credit),
            "REFUND" => Ok(TransactionType::Refund),
            other => Err(ValidationError::invalid_format(
                "transaction_type",
                format!("unknown transaction type '{}'", other),
            )),
        }
    }
}

/// Status of a payment transaction as held by the billing platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Awaiting asynchronous confirmation from the gateway.
    Pending,
    Success,
    PaymentFailure,
    PluginFailure,
    Unknown,
}

impl TransactionStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, TransactionStatus::Pending)
    }
}

impl StateMachine for TransactionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use TransactionStatus::*;
        matches!(
            (self, target),
            (Pending, Success) | (Pending, PaymentFailure)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use TransactionStatus::*;
        match self {
            Pending => vec![Success, PaymentFailure],
            Success | PaymentFailure | PluginFailure | Unknown => vec![],
        }
    }
}

/// A single transaction within a billing-platform payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentTransaction {
    pub id: KbTransactionId,
    pub transaction_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
}

/// Billing-platform payment with its transactions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: KbPaymentId,
    pub account_id: KbAccountId,
    pub transactions: Vec<PaymentTransaction>,
}

impl Payment {
    /// Locates the transaction with the given id.
    pub fn find_transaction(&self, id: &KbTransactionId) -> Option<&PaymentTransaction> {
        self.transactions.iter().find(|t| &t.id == id)
    }
}

/// Billing-platform account, needed to invoke pending-transaction transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: KbAccountId,
    pub external_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_type_parses_case_insensitively() {
        assert_eq!("refund".parse::<TransactionType>().unwrap(), TransactionType::Refund);
        assert_eq!("PURCHASE".parse::<TransactionType>().unwrap(), TransactionType::Purchase);
        assert!("chargeback".parse::<TransactionType>().is_err());
    }

    #[test]
    fn only_pending_transactions_can_settle() {
        assert!(TransactionStatus::Pending.can_transition_to(&TransactionStatus::Success));
        assert!(TransactionStatus::Pending.can_transition_to(&TransactionStatus::PaymentFailure));
        assert!(!TransactionStatus::Success.can_transition_to(&TransactionStatus::PaymentFailure));
        assert!(TransactionStatus::Success.is_terminal());
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let result = TransactionStatus::PaymentFailure.transition_to(TransactionStatus::Success);
        assert!(result.is_err());
    }

    #[test]
    fn valid_transitions_agree_with_can_transition_to() {
        use TransactionStatus::*;
        for status in [Pending, Success, PaymentFailure, PluginFailure, Unknown] {
            for target in status.valid_transitions() {
                assert!(status.can_transition_to(&target), "{:?} -> {:?}", status, target);
            }
        }
    }

    #[test]
    fn find_transaction_locates_by_id() {
        let wanted = KbTransactionId::new();
        let payment = Payment {
            id: KbPaymentId::new(),
            account_id: KbAccountId::new(),
            transactions: vec![
                PaymentTransaction {
                    id: KbTransactionId::new(),
                    transaction_type: TransactionType::Purchase,
                    status: TransactionStatus::Success,
                    amount: None,
                    currency: None,
                },
                PaymentTransaction {
                    id: wanted,
                    transaction_type: TransactionType::Refund,
                    status: TransactionStatus::Pending,
                    amount: None,
                    currency: None,
                },
            ],
        };

        let found = payment.find_transaction(&wanted).unwrap();
        assert_eq!(found.transaction_type, TransactionType::Refund);
        assert!(payment.find_transaction(&KbTransactionId::new()).is_none());
    }
}
