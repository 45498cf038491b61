//! REST API layer: route handlers, DTOs, tenant extraction and router
//! composition.
//!
//! Payment endpoints are mounted under `/api/v1`; health and configuration
//! live at the root.

pub mod dto;
pub mod extract;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}
