//! Strongly-typed identifier value objects.
//!
//! Billing-platform identifiers are UUIDs minted by the platform; the adapter
//! never generates them outside of tests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

uuid_id!(
    /// Isolation boundary for credentials and records.
    TenantId
);

uuid_id!(
    /// Billing-platform account identifier.
    KbAccountId
);

uuid_id!(
    /// Billing-platform payment identifier.
    KbPaymentId
);

uuid_id!(
    /// Billing-platform payment transaction identifier.
    KbTransactionId
);

uuid_id!(
    /// Billing-platform payment method identifier.
    KbPaymentMethodId
);
