//! HTTP adapter for the payment gateway.

mod dto;
mod handlers;
mod routes;

pub use dto::{ErrorResponse, NotificationAckResponse, PaymentInfoResponse};
pub use handlers::{GatewayApiError, GatewayAppState, Tenant, TENANT_HEADER};
pub use routes::gateway_router;
