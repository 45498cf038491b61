//! Append-only audit events for payment attempts.
//!
//! Every state change and every verifier call appends a [`PaymentEvent`].
//! Events are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AttemptId, AttemptStatus, ErrorCode};

/// Operation that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventType {
    /// Attempt created in `CREATED_INTENT`.
    IntentCreated,
    /// Client bound a transaction hash.
    TxSubmitted,
    /// The verifier was called; counters were bumped.
    VerificationAttempted,
    /// The verifier could not decide yet.
    VerificationPending,
    /// Ledger credited and attempt moved to `CREDITED`.
    PaymentCredited,
    /// Attempt moved to `REJECTED`.
    PaymentRejected,
    /// Attempt moved to `FAILED`.
    PaymentFailed,
}

impl PaymentEventType {
    /// Returns the event type as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::IntentCreated => "intent_created",
            Self::TxSubmitted => "tx_submitted",
            Self::VerificationAttempted => "verification_attempted",
            Self::VerificationPending => "verification_pending",
            Self::PaymentCredited => "payment_credited",
            Self::PaymentRejected => "payment_rejected",
            Self::PaymentFailed => "payment_failed",
        }
    }

    /// Event type recorded for a transition into `status`.
    #[must_use]
    pub const fn for_terminal(status: AttemptStatus) -> Self {
        match status {
            AttemptStatus::Credited => Self::PaymentCredited,
            AttemptStatus::Rejected => Self::PaymentRejected,
            _ => Self::PaymentFailed,
        }
    }
}

/// One audit row.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    /// Attempt the event belongs to.
    pub attempt_id: AttemptId,
    /// Operation verb.
    pub event_type: PaymentEventType,
    /// Status before the operation; `None` for creation.
    pub from_status: Option<AttemptStatus>,
    /// Status after the operation.
    pub to_status: AttemptStatus,
    /// Outcome reason, if any.
    pub error_code: Option<ErrorCode>,
    /// Opaque diagnostic payload.
    pub metadata: serde_json::Value,
    /// Event timestamp.
    pub created_at: DateTime<Utc>,
}

impl PaymentEvent {
    /// Builds an event with empty metadata.
    #[must_use]
    pub fn new(
        attempt_id: AttemptId,
        event_type: PaymentEventType,
        from_status: Option<AttemptStatus>,
        to_status: AttemptStatus,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            attempt_id,
            event_type,
            from_status,
            to_status,
            error_code: None,
            metadata: serde_json::Value::Null,
            created_at,
        }
    }

    /// Attaches an error code.
    #[must_use]
    pub fn with_error(mut self, error_code: Option<ErrorCode>) -> Self {
        self.error_code = error_code;
        self
    }

    /// Attaches diagnostic metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_event_types() {
        assert_eq!(
            PaymentEventType::for_terminal(AttemptStatus::Credited),
            PaymentEventType::PaymentCredited
        );
        assert_eq!(
            PaymentEventType::for_terminal(AttemptStatus::Rejected).as_str(),
            "payment_rejected"
        );
        assert_eq!(
            PaymentEventType::for_terminal(AttemptStatus::Failed).as_str(),
            "payment_failed"
        );
    }

    #[test]
    fn event_serializes_with_codes() {
        let event = PaymentEvent::new(
            AttemptId::new(),
            PaymentEventType::PaymentRejected,
            Some(AttemptStatus::PendingUnverified),
            AttemptStatus::Rejected,
            Utc::now(),
        )
        .with_error(Some(ErrorCode::SenderMismatch))
        .with_metadata(serde_json::json!({ "actual_from": "0xdead" }));

        let json = serde_json::to_string(&event).unwrap_or_default();
        assert!(json.contains("payment_rejected"));
        assert!(json.contains("SENDER_MISMATCH"));
        assert!(json.contains("PENDING_UNVERIFIED"));
        assert!(json.contains("0xdead"));
    }
}
