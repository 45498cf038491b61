//! Gateway error types with HTTP status code mapping.
//!
//! [`PaymentError`] is the central error type for request handling. Each
//! variant maps to a specific HTTP status code and structured JSON error
//! response. Payment *outcomes* (rejected, failed) are not errors; they are
//! returned as `{status, error_code}` bodies by the handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{AttemptId, ErrorCode, TransitionError};
use crate::persistence::StoreError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "error_code": "AMOUNT_OUT_OF_BOUNDS",
///     "message": "amount 5 cents outside [100, 100000]"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see code ranges on [`PaymentError`]).
    pub code: u32,
    /// Stable payment error code, when one applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    /// Human-readable error message.
    pub message: String,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                  |
/// |-----------|-----------------|------------------------------|
/// | 1000–1999 | Validation      | 400 Bad Request / 401        |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server          | 500 Internal Server Error    |
/// | 4000–4999 | Payment rules   | 422 Unprocessable Entity     |
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// No attempt with this id exists for the calling tenant.
    #[error("payment attempt not found: {0}")]
    AttemptNotFound(AttemptId),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Tenant identity headers are missing or malformed.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Requested amount is outside the configured bounds.
    #[error("amount {amount} cents outside [{min}, {max}]")]
    AmountOutOfBounds {
        /// Requested amount.
        amount: u64,
        /// Lower bound (inclusive).
        min: u64,
        /// Upper bound (inclusive).
        max: u64,
    },

    /// The transaction hash already funds a different attempt.
    #[error("transaction is already bound to another payment")]
    TxBoundElsewhere,

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PaymentError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::Unauthenticated(_) => 1002,
            Self::AttemptNotFound(_) => 2001,
            Self::TxBoundElsewhere => 2002,
            Self::Internal(_) => 3000,
            Self::Persistence(_) => 3001,
            Self::AmountOutOfBounds { .. } => 4001,
        }
    }

    /// Returns the stable payment error code, if the variant has one.
    #[must_use]
    pub const fn payment_code(&self) -> Option<ErrorCode> {
        match self {
            Self::AmountOutOfBounds { .. } => Some(ErrorCode::AmountOutOfBounds),
            Self::TxBoundElsewhere => Some(ErrorCode::ConflictTxBoundElsewhere),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::AttemptNotFound(_) => StatusCode::NOT_FOUND,
            Self::TxBoundElsewhere => StatusCode::CONFLICT,
            Self::AmountOutOfBounds { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to clients. Server-side failures are logged
    /// with full detail and reported generically.
    fn public_message(&self) -> String {
        match self {
            Self::Persistence(_) | Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::AttemptNotFound(id),
            StoreError::TxHashTaken { .. } => Self::TxBoundElsewhere,
            other => Self::Persistence(other.to_string()),
        }
    }
}

impl From<TransitionError> for PaymentError {
    fn from(err: TransitionError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                error_code: self.payment_code(),
                message: self.public_message(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_client_variants() {
        let id = AttemptId::new();
        assert!(matches!(
            PaymentError::from(StoreError::NotFound(id)),
            PaymentError::AttemptNotFound(found) if found == id
        ));
        let taken = StoreError::TxHashTaken {
            chain_id: 1,
            tx_hash: "0xabc".to_string(),
        };
        let err = PaymentError::from(taken);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.payment_code(), Some(ErrorCode::ConflictTxBoundElsewhere));
    }

    #[test]
    fn server_errors_hide_detail() {
        let err = PaymentError::Persistence("connection refused to 10.0.0.5".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "internal server error");
    }

    #[test]
    fn amount_bounds_carry_stable_code() {
        let err = PaymentError::AmountOutOfBounds {
            amount: 5,
            min: 100,
            max: 100_000,
        };
        assert_eq!(err.error_code(), 4001);
        assert_eq!(err.payment_code(), Some(ErrorCode::AmountOutOfBounds));
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
