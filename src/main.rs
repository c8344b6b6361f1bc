use std::sync::Arc;

use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dwolla_gateway::adapters::billing::HttpBillingPlatform;
use dwolla_gateway::adapters::dwolla::DwollaTransferApi;
use dwolla_gateway::adapters::http::{gateway_router, GatewayAppState};
use dwolla_gateway::adapters::postgres::{
    PostgresNotificationRepository, PostgresPaymentMethodRepository, PostgresResponseRepository,
    PostgresTokenRepository,
};
use dwolla_gateway::application::{
    NotificationReconciler, PaymentPluginApi, TokenGuard, TransferExecutor,
};
use dwolla_gateway::config::{AppConfig, ServerConfig};

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    if server.log_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        dwolla_api = %config.dwolla.api_base_url,
        webhook_signatures = config.dwolla.webhook_secret.is_some(),
        "Starting dwolla-gateway"
    );

    let pool = config.database.pool_options().connect(&config.database.url).await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let tokens = Arc::new(PostgresTokenRepository::new(pool.clone()));
    let payment_methods = Arc::new(PostgresPaymentMethodRepository::new(pool.clone()));
    let responses = Arc::new(PostgresResponseRepository::new(pool.clone()));
    let notifications = Arc::new(PostgresNotificationRepository::new(pool));

    let api = Arc::new(DwollaTransferApi::new(config.dwolla.client_config()));
    let billing = Arc::new(HttpBillingPlatform::new(config.billing.client_config()));

    let token_guard = Arc::new(TokenGuard::new(tokens, api.clone()));
    let executor = Arc::new(TransferExecutor::new(
        token_guard,
        api,
        payment_methods,
        responses.clone(),
        config.dwolla.merchant_policy(),
    ));
    let reconciler = Arc::new(NotificationReconciler::new(
        notifications,
        responses.clone(),
        billing,
    ));
    let plugin = Arc::new(PaymentPluginApi::new(executor, reconciler, responses));

    let state = GatewayAppState::new(plugin, config.dwolla.signature_verifier());
    let app = gateway_router()
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");
    axum::serve(listener, app).await?;

    Ok(())
}
