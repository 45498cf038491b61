//! Payment DTOs for intent, submit, status, events and balance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{AttemptId, AttemptStatus, ErrorCode, PaymentAttempt, PaymentEvent, TenantId};

/// Request body for `POST /payments/intents`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIntentRequest {
    /// Amount to pay, in US cents.
    pub amount_usd_cents: u64,
}

/// Response body for `POST /payments/intents` (201 Created).
///
/// Everything the client needs to build the token transfer.
#[derive(Debug, Serialize, ToSchema)]
pub struct IntentResponse {
    /// Handle for submit and status calls.
    #[schema(value_type = uuid::Uuid)]
    pub attempt_id: AttemptId,
    /// Chain to send on.
    pub chain_id: u64,
    /// Token contract.
    pub token: String,
    /// Recipient address.
    pub to: String,
    /// Exact transfer amount in token smallest units, as a decimal string.
    pub amount_raw: String,
    /// Intent amount in cents.
    pub amount_usd_cents: u64,
    /// Submit deadline.
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<&PaymentAttempt> for IntentResponse {
    fn from(attempt: &PaymentAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            chain_id: attempt.chain_id,
            token: attempt.token.clone(),
            to: attempt.to_address.clone(),
            amount_raw: attempt.amount_raw.to_string(),
            amount_usd_cents: attempt.amount_usd_cents,
            expires_at: attempt.expires_at,
        }
    }
}

/// Request body for `POST /payments/{id}/submit`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitTxRequest {
    /// `0x`-prefixed 32-byte transaction hash. Case-insensitive.
    pub tx_hash: String,
}

/// Attempt status as reported by submit and status reads.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    /// Attempt identifier.
    #[schema(value_type = uuid::Uuid)]
    pub attempt_id: AttemptId,
    /// Current lifecycle status.
    pub status: AttemptStatus,
    /// Why the attempt was rejected or failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Bound transaction hash (lowercase).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
}

impl From<&PaymentAttempt> for PaymentStatusResponse {
    fn from(attempt: &PaymentAttempt) -> Self {
        Self {
            attempt_id: attempt.id,
            status: attempt.status,
            error_code: attempt.error_code,
            tx_hash: attempt.tx_hash.clone(),
        }
    }
}

/// One audit event of an attempt.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentEventDto {
    /// Operation verb (`intent_created`, `tx_submitted`, ...).
    pub event_type: String,
    /// Status before the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_status: Option<AttemptStatus>,
    /// Status after the operation.
    pub to_status: AttemptStatus,
    /// Outcome reason, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Diagnostic payload.
    #[schema(value_type = Object)]
    pub metadata: serde_json::Value,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

impl From<PaymentEvent> for PaymentEventDto {
    fn from(event: PaymentEvent) -> Self {
        Self {
            event_type: event.event_type.as_str().to_string(),
            from_status: event.from_status,
            to_status: event.to_status,
            error_code: event.error_code,
            metadata: event.metadata,
            created_at: event.created_at,
        }
    }
}

/// Response body for `GET /payments/{id}/events`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentEventsResponse {
    /// Attempt identifier.
    #[schema(value_type = uuid::Uuid)]
    pub attempt_id: AttemptId,
    /// Events in insertion order.
    pub events: Vec<PaymentEventDto>,
}

/// Response body for `GET /balance`.
#[derive(Debug, Serialize, ToSchema)]
pub struct BalanceResponse {
    /// Calling tenant.
    #[schema(value_type = String)]
    pub tenant_id: TenantId,
    /// Credits accumulated from settled payments.
    pub balance: i64,
}
