//! Payment handlers: intents, transaction submission, status, audit
//! events and balance.
//!
//! Every handler is tenant-scoped through [`AuthenticatedTenant`]. An
//! attempt owned by another tenant is reported as not found.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    BalanceResponse, CreateIntentRequest, IntentResponse, PaymentEventDto, PaymentEventsResponse,
    PaymentStatusResponse, SubmitTxRequest,
};
use crate::api::extract::AuthenticatedTenant;
use crate::app_state::AppState;
use crate::domain::AttemptId;
use crate::error::{ErrorResponse, PaymentError};

/// `POST /payments/intents`: Create a payment intent.
///
/// # Errors
///
/// Returns [`PaymentError::AmountOutOfBounds`] if the amount is outside the
/// configured bounds.
#[utoipa::path(
    post,
    path = "/api/v1/payments/intents",
    tag = "Payments",
    summary = "Create a payment intent",
    description = "Quotes the exact token transfer for an amount in cents. The intent expires if no transaction is submitted in time.",
    request_body = CreateIntentRequest,
    params(
        ("x-tenant-id" = String, Header, description = "Authenticated tenant id"),
        ("x-wallet-address" = String, Header, description = "Tenant wallet address"),
    ),
    responses(
        (status = 201, description = "Intent created", body = IntentResponse),
        (status = 401, description = "Missing identity headers", body = ErrorResponse),
        (status = 422, description = "Amount out of bounds", body = ErrorResponse),
    )
)]
pub async fn create_intent(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Json(req): Json<CreateIntentRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let attempt = state
        .payment_service
        .create_intent(&tenant, req.amount_usd_cents)
        .await?;
    Ok((StatusCode::CREATED, Json(IntentResponse::from(&attempt))))
}

/// `POST /payments/{id}/submit`: Bind a transaction hash.
///
/// # Errors
///
/// Returns [`PaymentError::AttemptNotFound`] for unknown or foreign
/// attempts, [`PaymentError::InvalidRequest`] for a malformed hash or a
/// second hash, [`PaymentError::TxBoundElsewhere`] if the hash funds
/// another attempt.
#[utoipa::path(
    post,
    path = "/api/v1/payments/{id}/submit",
    tag = "Payments",
    summary = "Submit a transaction hash",
    description = "Binds the transaction to the attempt and runs a first verification pass. Resubmitting the same hash is a no-op.",
    request_body = SubmitTxRequest,
    params(
        ("id" = uuid::Uuid, Path, description = "Attempt UUID"),
        ("x-tenant-id" = String, Header, description = "Authenticated tenant id"),
        ("x-wallet-address" = String, Header, description = "Tenant wallet address"),
    ),
    responses(
        (status = 200, description = "Attempt status after submission", body = PaymentStatusResponse),
        (status = 400, description = "Malformed or conflicting hash", body = ErrorResponse),
        (status = 404, description = "Attempt not found", body = ErrorResponse),
        (status = 409, description = "Transaction funds another attempt", body = ErrorResponse),
    )
)]
pub async fn submit_tx(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(id): Path<uuid::Uuid>,
    Json(req): Json<SubmitTxRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let attempt = state
        .payment_service
        .submit_tx(&tenant, AttemptId::from_uuid(id), &req.tx_hash)
        .await?;
    Ok(Json(PaymentStatusResponse::from(&attempt)))
}

/// `GET /payments/{id}`: Read an attempt's status.
///
/// Reading a pending attempt may advance it: the read closes it once the
/// pending window is over, or runs a throttled verification pass.
///
/// # Errors
///
/// Returns [`PaymentError::AttemptNotFound`] for unknown or foreign
/// attempts.
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}",
    tag = "Payments",
    summary = "Get payment status",
    params(
        ("id" = uuid::Uuid, Path, description = "Attempt UUID"),
        ("x-tenant-id" = String, Header, description = "Authenticated tenant id"),
        ("x-wallet-address" = String, Header, description = "Tenant wallet address"),
    ),
    responses(
        (status = 200, description = "Current attempt status", body = PaymentStatusResponse),
        (status = 404, description = "Attempt not found", body = ErrorResponse),
    )
)]
pub async fn get_payment(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, PaymentError> {
    let attempt = state
        .payment_service
        .get_status(&tenant, AttemptId::from_uuid(id))
        .await?;
    Ok(Json(PaymentStatusResponse::from(&attempt)))
}

/// `GET /payments/{id}/events`: Audit trail of an attempt.
///
/// # Errors
///
/// Returns [`PaymentError::AttemptNotFound`] for unknown or foreign
/// attempts.
#[utoipa::path(
    get,
    path = "/api/v1/payments/{id}/events",
    tag = "Payments",
    summary = "List payment events",
    description = "Returns the append-only audit events of the attempt in insertion order.",
    params(
        ("id" = uuid::Uuid, Path, description = "Attempt UUID"),
        ("x-tenant-id" = String, Header, description = "Authenticated tenant id"),
        ("x-wallet-address" = String, Header, description = "Tenant wallet address"),
    ),
    responses(
        (status = 200, description = "Audit events", body = PaymentEventsResponse),
        (status = 404, description = "Attempt not found", body = ErrorResponse),
    )
)]
pub async fn list_events(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, PaymentError> {
    let attempt_id = AttemptId::from_uuid(id);
    let events = state.payment_service.events(&tenant, attempt_id).await?;
    Ok(Json(PaymentEventsResponse {
        attempt_id,
        events: events.into_iter().map(PaymentEventDto::from).collect(),
    }))
}

/// `GET /balance`: Tenant credit balance.
///
/// # Errors
///
/// Returns [`PaymentError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/api/v1/balance",
    tag = "Payments",
    summary = "Get credit balance",
    params(
        ("x-tenant-id" = String, Header, description = "Authenticated tenant id"),
        ("x-wallet-address" = String, Header, description = "Tenant wallet address"),
    ),
    responses(
        (status = 200, description = "Credit balance", body = BalanceResponse),
        (status = 401, description = "Missing identity headers", body = ErrorResponse),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    AuthenticatedTenant(tenant): AuthenticatedTenant,
) -> Result<impl IntoResponse, PaymentError> {
    let balance = state.payment_service.balance(&tenant.id).await?;
    Ok(Json(BalanceResponse {
        tenant_id: tenant.id,
        balance,
    }))
}

/// Payment routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/intents", post(create_intent))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/submit", post(submit_tx))
        .route("/payments/{id}/events", get(list_events))
        .route("/balance", get(get_balance))
}
