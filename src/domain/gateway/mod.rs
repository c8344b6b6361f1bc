//! Gateway module - the processor-facing domain.
//!
//! Transfers, funding sources, webhook events and the response ledger model,
//! together with the status mapper that translates processor vocabulary into
//! billing-platform statuses.

mod errors;
mod hal;
mod money;
mod notification;
mod payment_method;
mod resources;
mod response;
mod token;
mod topic;
mod transfer;

pub use errors::{ErrorCategory, GatewayError};
pub use hal::{rel, HalLink, HalLinks};
pub use money::Money;
pub use notification::{
    DwollaEvent, GatewayNotification, NotificationOutcome, ProcessingState, WebhookRecord,
};
pub use payment_method::PaymentMethodRecord;
pub use resources::{EmbeddedFundingSources, FundingSource, FundingSourceList, RootResource, TokenResponse};
pub use response::{RejectionDetail, ResponseEntry, TransactionAttempt, TransactionOutcome};
pub use token::{AccessToken, TokenPair};
pub use topic::{EventTopic, TopicScope, TransferEvent};
pub use transfer::{TransferDirection, TransferFailure, TransferRecord, TransferRequest, TransferStatus};
