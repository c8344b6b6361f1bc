//! HTTP handlers for the gateway endpoints.
//!
//! The billing platform host calls the payment endpoints; Dwolla calls the
//! webhook endpoint. Every request names its tenant in `X-Tenant-Id`.

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::dwolla::{SignatureError, WebhookSignatureVerifier, SIGNATURE_HEADER};
use crate::application::{PaymentPluginApi, PaymentRequest};
use crate::domain::billing::{CallContext, TransactionType};
use crate::domain::foundation::{KbPaymentId, TenantId};
use crate::domain::gateway::{ErrorCategory, GatewayError};

use super::dto::{ErrorResponse, NotificationAckResponse, PaymentInfoResponse};

pub const TENANT_HEADER: &str = "X-Tenant-Id";

// ════════════════════════════════════════════════════════════════════════════════
// State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct GatewayAppState {
    pub plugin: Arc<PaymentPluginApi>,
    /// Absent only when no webhook secret is configured.
    pub verifier: Option<WebhookSignatureVerifier>,
}

impl GatewayAppState {
    pub fn new(plugin: Arc<PaymentPluginApi>, verifier: Option<WebhookSignatureVerifier>) -> Self {
        Self { plugin, verifier }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Tenant extractor
// ════════════════════════════════════════════════════════════════════════════════

/// Tenant named by the `X-Tenant-Id` header.
#[derive(Debug, Clone, Copy)]
pub struct Tenant(pub TenantId);

#[async_trait]
impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = GatewayApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_HEADER)
            .ok_or(GatewayApiError::MissingTenant)?
            .to_str()
            .map_err(|_| GatewayApiError::InvalidTenant)?;
        raw.trim()
            .parse::<TenantId>()
            .map(Tenant)
            .map_err(|_| GatewayApiError::InvalidTenant)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /payments/:operation
pub async fn execute_payment(
    State(state): State<GatewayAppState>,
    Tenant(tenant_id): Tenant,
    Path(operation): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> Result<impl IntoResponse, GatewayApiError> {
    let transaction_type: TransactionType = operation
        .parse()
        .map_err(|_| GatewayApiError::UnknownOperation(operation))?;
    let context = CallContext::new(tenant_id);

    let outcome = state.plugin.execute(transaction_type, request, &context).await?;
    Ok(Json(outcome))
}

/// GET /payment-info/:payment_id
pub async fn get_payment_info(
    State(state): State<GatewayAppState>,
    Tenant(tenant_id): Tenant,
    Path(kb_payment_id): Path<KbPaymentId>,
) -> Result<impl IntoResponse, GatewayApiError> {
    let context = CallContext::new(tenant_id);
    let transactions = state.plugin.get_payment_info(&kb_payment_id, &context).await?;
    Ok(Json(PaymentInfoResponse {
        kb_payment_id,
        transactions,
    }))
}

/// POST /webhooks/dwolla
///
/// The signature is checked over the raw bytes before anything is parsed.
pub async fn handle_dwolla_webhook(
    State(state): State<GatewayAppState>,
    Tenant(tenant_id): Tenant,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayApiError> {
    if let Some(verifier) = &state.verifier {
        let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
        verifier.verify(&body, signature)?;
    }

    let payload = std::str::from_utf8(&body).map_err(|_| {
        GatewayError::InvalidNotification("payload is not valid UTF-8".to_string())
    })?;

    let context = CallContext::new(tenant_id);
    let notification = state.plugin.process_notification(payload, &context).await?;

    let status = StatusCode::from_u16(notification.status).unwrap_or(StatusCode::OK);
    tracing::info!(
        tenant_id = %tenant_id,
        outcome = notification.outcome.as_str(),
        "Dwolla webhook processed"
    );
    Ok((status, Json(NotificationAckResponse::from(notification))))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

// ════════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum GatewayApiError {
    Gateway(GatewayError),
    Signature(SignatureError),
    MissingTenant,
    InvalidTenant,
    UnknownOperation(String),
}

impl From<GatewayError> for GatewayApiError {
    fn from(err: GatewayError) -> Self {
        GatewayApiError::Gateway(err)
    }
}

impl From<SignatureError> for GatewayApiError {
    fn from(err: SignatureError) -> Self {
        GatewayApiError::Signature(err)
    }
}

impl IntoResponse for GatewayApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            GatewayApiError::MissingTenant => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("MISSING_TENANT", format!("{} header is required", TENANT_HEADER)),
            ),
            GatewayApiError::InvalidTenant => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("INVALID_TENANT", format!("{} must be a UUID", TENANT_HEADER)),
            ),
            GatewayApiError::UnknownOperation(op) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("UNKNOWN_OPERATION", format!("Unknown payment operation '{}'", op)),
            ),
            GatewayApiError::Signature(err) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("INVALID_WEBHOOK_SIGNATURE", err.to_string()),
            ),
            GatewayApiError::Gateway(err) => {
                let status = match err.category() {
                    ErrorCategory::InvalidInput => StatusCode::BAD_REQUEST,
                    ErrorCategory::DataIntegrityViolation => StatusCode::CONFLICT,
                    ErrorCategory::TransientInfrastructure => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorCategory::StateInconsistency | ErrorCategory::Configuration => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                if status.is_server_error() {
                    tracing::error!(code = err.code(), error = %err, "Gateway request failed");
                }
                (
                    status,
                    ErrorResponse::new(err.code(), err.to_string()).retryable(err.is_retryable()),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::dwolla::MockTransferApi;
    use crate::adapters::http::gateway::gateway_router;
    use crate::adapters::memory::{
        InMemoryBillingPlatform, InMemoryNotificationRepository, InMemoryPaymentMethodRepository,
        InMemoryResponseRepository, InMemoryTokenRepository,
    };
    use crate::application::{
        MerchantFundingSourcePolicy, NotificationReconciler, TokenGuard, TransferExecutor,
    };
    use crate::domain::foundation::{KbAccountId, KbPaymentMethodId};
    use crate::domain::gateway::{PaymentMethodRecord, TokenPair};
    use crate::ports::{PaymentMethodRepository, TokenRepository};
    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use secrecy::SecretString;
    use tower::ServiceExt;

    const IGNORED_EVENT: &str =
        r#"{"id":"e1","topic":"customer_funding_source_added","_links":{}}"#;

    struct Fixture {
        app: Router,
        api: Arc<MockTransferApi>,
        tenant: TenantId,
        method: KbPaymentMethodId,
    }

    async fn fixture(verifier: Option<WebhookSignatureVerifier>) -> Fixture {
        let tenant = TenantId::new();
        let tokens = Arc::new(InMemoryTokenRepository::new());
        tokens.save(&TokenPair::new(tenant, "access", "refresh")).await.unwrap();
        let method = KbPaymentMethodId::new();
        let methods = Arc::new(InMemoryPaymentMethodRepository::new());
        methods
            .save(&PaymentMethodRecord::new(tenant, KbAccountId::new(), method, "customer-fs"))
            .await
            .unwrap();
        let api = Arc::new(MockTransferApi::new());
        api.add_funding_source("customer-fs", false);
        api.add_merchant_funding_source("merchant-fs", false);

        let responses = Arc::new(InMemoryResponseRepository::new());
        let executor = Arc::new(TransferExecutor::new(
            Arc::new(TokenGuard::new(tokens, api.clone())),
            api.clone(),
            methods,
            responses.clone(),
            MerchantFundingSourcePolicy::FirstActive,
        ));
        let reconciler = Arc::new(NotificationReconciler::new(
            Arc::new(InMemoryNotificationRepository::new()),
            responses.clone(),
            Arc::new(InMemoryBillingPlatform::new()),
        ));
        let plugin = Arc::new(PaymentPluginApi::new(executor, reconciler, responses));

        Fixture {
            app: gateway_router().with_state(GatewayAppState::new(plugin, verifier)),
            api,
            tenant,
            method,
        }
    }

    fn verifier() -> WebhookSignatureVerifier {
        WebhookSignatureVerifier::new(SecretString::new("webhook-secret".to_string()))
    }

    fn payment_body(method: KbPaymentMethodId) -> String {
        serde_json::json!({
            "kb_account_id": KbAccountId::new(),
            "kb_payment_id": KbPaymentId::new(),
            "kb_transaction_id": crate::domain::foundation::KbTransactionId::new(),
            "kb_payment_method_id": method,
            "amount": "25.00",
            "currency": "USD",
        })
        .to_string()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn purchase_returns_outcome() {
        let f = fixture(None).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payments/purchase")
                    .header(TENANT_HEADER, f.tenant.to_string())
                    .header("content-type", "application/json")
                    .body(Body::from(payment_body(f.method)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["transaction_type"], "PURCHASE");
        assert_eq!(f.api.created_transfers().len(), 1);
    }

    #[tokio::test]
    async fn payment_info_lists_recorded_purchase() {
        let f = fixture(None).await;
        let body = payment_body(f.method);
        let kb_payment_id: serde_json::Value =
            serde_json::from_str::<serde_json::Value>(&body).unwrap()["kb_payment_id"].clone();

        f.app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payments/purchase")
                    .header(TENANT_HEADER, f.tenant.to_string())
                    .header("content-type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .uri(format!("/payment-info/{}", kb_payment_id.as_str().unwrap()))
                    .header(TENANT_HEADER, f.tenant.to_string())
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let info = body_json(response).await;
        assert_eq!(info["kb_payment_id"], kb_payment_id);
        assert_eq!(info["transactions"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_operation_is_bad_request() {
        let f = fixture(None).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/payments/chargeback")
                    .header(TENANT_HEADER, f.tenant.to_string())
                    .header("content-type", "application/json")
                    .body(Body::from(payment_body(f.method)))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error_code"], "UNKNOWN_OPERATION");
    }

    #[tokio::test]
    async fn missing_tenant_is_bad_request() {
        let f = fixture(None).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/dwolla")
                    .body(Body::from(IGNORED_EVENT))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error_code"], "MISSING_TENANT");
    }

    #[tokio::test]
    async fn signed_webhook_is_acknowledged() {
        let f = fixture(Some(verifier())).await;
        let signature = verifier().sign(IGNORED_EVENT.as_bytes()).unwrap();

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/dwolla")
                    .header(TENANT_HEADER, f.tenant.to_string())
                    .header(SIGNATURE_HEADER, signature)
                    .body(Body::from(IGNORED_EVENT))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["outcome"], "ignored");
    }

    #[tokio::test]
    async fn unsigned_webhook_is_unauthorized_when_secret_configured() {
        let f = fixture(Some(verifier())).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/dwolla")
                    .header(TENANT_HEADER, f.tenant.to_string())
                    .body(Body::from(IGNORED_EVENT))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(response).await["error_code"], "INVALID_WEBHOOK_SIGNATURE");
    }

    #[tokio::test]
    async fn malformed_webhook_is_bad_request() {
        let f = fixture(None).await;

        let response = f
            .app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/dwolla")
                    .header(TENANT_HEADER, f.tenant.to_string())
                    .body(Body::from("not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error_code"], "INVALID_NOTIFICATION");
    }

    #[test]
    fn transient_errors_map_to_service_unavailable() {
        let err = GatewayApiError::from(GatewayError::UnknownTransfer("t1".to_string()));
        assert_eq!(err.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn state_inconsistency_maps_to_internal_error() {
        let err = GatewayApiError::from(GatewayError::StateInconsistency {
            transfer_id: "t1".to_string(),
            source: crate::domain::foundation::DomainError::new(
                crate::domain::foundation::ErrorCode::DatabaseError,
                "down",
            ),
        });
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
