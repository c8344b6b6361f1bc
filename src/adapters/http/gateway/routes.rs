//! Axum router for the gateway endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{
    execute_payment, get_payment_info, handle_dwolla_webhook, health, GatewayAppState,
};

/// Creates the gateway router.
///
/// # Routes
///
/// ## Billing platform host
/// - `POST /payments/:operation` - Run a payment operation (purchase, refund, ...)
/// - `GET /payment-info/:payment_id` - Recorded transactions of a payment
///
/// ## Dwolla (signature verified)
/// - `POST /webhooks/dwolla` - Deliver a webhook event
///
/// ## Operations
/// - `GET /health` - Liveness probe
pub fn gateway_router() -> Router<GatewayAppState> {
    Router::new()
        .route("/payments/:operation", post(execute_payment))
        .route("/payment-info/:payment_id", get(get_payment_info))
        .route("/webhooks/dwolla", post(handle_dwolla_webhook))
        .route("/health", get(health))
}
