//! Foundation module - Shared domain primitives.
//!
//! Contains identifiers, timestamps, the state machine trait and the
//! store-level error type shared by every part of the gateway.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{KbAccountId, KbPaymentId, KbPaymentMethodId, KbTransactionId, TenantId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
