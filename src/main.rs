//! stablepay-gateway server entry point.
//!
//! Loads configuration, connects the store and the chain verifier, and
//! starts the Axum HTTP server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use stablepay_gateway::api;
use stablepay_gateway::app_state::AppState;
use stablepay_gateway::chain::build_verifier;
use stablepay_gateway::config::GatewayConfig;
use stablepay_gateway::domain::SystemClock;
use stablepay_gateway::persistence::{AttemptStore, MemoryAttemptStore, PostgresAttemptStore};
use stablepay_gateway::service::PaymentService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = GatewayConfig::from_env()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log_json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    tracing::info!(addr = %config.listen_addr, "starting stablepay-gateway");

    // Build persistence layer
    let store: Arc<dyn AttemptStore> = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("Failed to connect to PostgreSQL")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to run migrations: {e}"))?;
        tracing::info!("database migrations completed");
        Arc::new(PostgresAttemptStore::new(pool))
    } else {
        tracing::warn!("persistence disabled, payment state lives in process memory");
        Arc::new(MemoryAttemptStore::new())
    };

    // Build chain verifier
    let verifier = build_verifier(&config.verifier).context("Failed to build chain verifier")?;
    tracing::info!(
        chain_family = ?config.verifier.chain_family,
        chain_id = config.payment.chain_id,
        min_confirmations = config.verifier.min_confirmations,
        "chain verifier ready"
    );

    // Build service layer
    let payment_service = Arc::new(PaymentService::new(
        store,
        verifier,
        Arc::new(SystemClock),
        config.payment.clone(),
    ));

    // Build application state
    let app_state = AppState { payment_service };

    // Build router
    let app = Router::new().merge(api::build_router());

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        app.merge(
            SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()),
        )
    };

    let app = app
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {e}"))?;

    Ok(())
}
