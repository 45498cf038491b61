//! System endpoints: health check and public payment configuration.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::config::PaymentConfigView;

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health`: Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// `GET /config/payment`: Canonical payment configuration.
#[utoipa::path(
    get,
    path = "/config/payment",
    tag = "System",
    summary = "Payment configuration",
    description = "Returns the chain, token and recipient every intent is created against, plus the accepted amount bounds.",
    responses(
        (status = 200, description = "Canonical payment configuration", body = PaymentConfigView),
    )
)]
pub async fn payment_config_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.payment_service.config_view())
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/payment", get(payment_config_handler))
}
