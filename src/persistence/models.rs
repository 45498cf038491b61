//! Database rows for attempts, events and ledger entries.
//!
//! Postgres has no unsigned integers, so counters and amounts are stored as
//! `BIGINT` and converted back with range checks. A row that fails to
//! convert is reported as [`StoreError::Corrupt`] rather than silently
//! truncated.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreError;
use crate::domain::{
    AttemptId, AttemptStatus, ErrorCode, LedgerEntry, PaymentAttempt, PaymentEvent,
    PaymentEventType, TenantId,
};

/// Column list shared by every attempt `SELECT`.
pub(crate) const ATTEMPT_COLUMNS: &str = "id, tenant_id, chain_id, tx_hash, from_address, \
     token, to_address, amount_raw, amount_usd_cents, status, error_code, expires_at, \
     submitted_at, last_verify_attempt_at, verify_attempt_count, created_at, updated_at, version";

/// A row of the `payment_attempts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttemptRow {
    /// Attempt id.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: String,
    /// Chain id.
    pub chain_id: i64,
    /// Bound transaction hash.
    pub tx_hash: Option<String>,
    /// Expected sender.
    pub from_address: String,
    /// Token contract.
    pub token: String,
    /// Recipient.
    pub to_address: String,
    /// Expected amount in smallest units.
    pub amount_raw: i64,
    /// Requested amount in cents.
    pub amount_usd_cents: i64,
    /// Status string.
    pub status: String,
    /// Error code string.
    pub error_code: Option<String>,
    /// Intent deadline.
    pub expires_at: Option<DateTime<Utc>>,
    /// Submission time.
    pub submitted_at: Option<DateTime<Utc>>,
    /// Last verifier call.
    pub last_verify_attempt_at: Option<DateTime<Utc>>,
    /// Verifier call count.
    pub verify_attempt_count: i32,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last mutation time.
    pub updated_at: DateTime<Utc>,
    /// Optimistic version.
    pub version: i64,
}

impl TryFrom<AttemptRow> for PaymentAttempt {
    type Error = StoreError;

    fn try_from(row: AttemptRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<AttemptStatus>()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let error_code = row
            .error_code
            .as_deref()
            .map(str::parse::<ErrorCode>)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Self {
            id: AttemptId::from_uuid(row.id),
            tenant_id: TenantId::new(row.tenant_id),
            chain_id: to_unsigned(row.chain_id, "chain_id")?,
            tx_hash: row.tx_hash,
            from_address: row.from_address,
            token: row.token,
            to_address: row.to_address,
            amount_raw: to_unsigned(row.amount_raw, "amount_raw")?,
            amount_usd_cents: to_unsigned(row.amount_usd_cents, "amount_usd_cents")?,
            status,
            error_code,
            expires_at: row.expires_at,
            submitted_at: row.submitted_at,
            last_verify_attempt_at: row.last_verify_attempt_at,
            verify_attempt_count: u32::try_from(row.verify_attempt_count).map_err(|_| {
                StoreError::Corrupt(format!(
                    "verify_attempt_count out of range: {}",
                    row.verify_attempt_count
                ))
            })?,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// A row of the `payment_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Attempt id.
    pub attempt_id: Uuid,
    /// Event type string.
    pub event_type: String,
    /// Status before.
    pub from_status: Option<String>,
    /// Status after.
    pub to_status: String,
    /// Error code string.
    pub error_code: Option<String>,
    /// JSONB metadata.
    pub metadata: serde_json::Value,
    /// Event time.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for PaymentEvent {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let corrupt = |e: &dyn std::fmt::Display| StoreError::Corrupt(e.to_string());
        let event_type = parse_event_type(&row.event_type)?;
        let from_status = row
            .from_status
            .as_deref()
            .map(str::parse::<AttemptStatus>)
            .transpose()
            .map_err(|e| corrupt(&e))?;
        let to_status = row
            .to_status
            .parse::<AttemptStatus>()
            .map_err(|e| corrupt(&e))?;
        let error_code = row
            .error_code
            .as_deref()
            .map(str::parse::<ErrorCode>)
            .transpose()
            .map_err(|e| corrupt(&e))?;
        Ok(PaymentEvent::new(
            AttemptId::from_uuid(row.attempt_id),
            event_type,
            from_status,
            to_status,
            row.created_at,
        )
        .with_error(error_code)
        .with_metadata(row.metadata))
    }
}

/// A row of the `ledger_entries` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct LedgerRow {
    /// Idempotency key.
    pub reference: String,
    /// Credited tenant.
    pub tenant_id: String,
    /// Settled attempt.
    pub attempt_id: Uuid,
    /// Credit delta.
    pub amount: i64,
    /// Balance after the entry.
    pub balance_after: i64,
    /// Write time.
    pub created_at: DateTime<Utc>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        Self {
            reference: row.reference,
            tenant_id: TenantId::new(row.tenant_id),
            attempt_id: AttemptId::from_uuid(row.attempt_id),
            amount: row.amount,
            balance_after: row.balance_after,
            created_at: row.created_at,
        }
    }
}

/// Converts a domain unsigned value to a `BIGINT` bind parameter.
pub(crate) fn to_bigint(value: u64, column: &str) -> Result<i64, StoreError> {
    i64::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{column} does not fit in BIGINT: {value}")))
}

fn to_unsigned(value: i64, column: &str) -> Result<u64, StoreError> {
    u64::try_from(value)
        .map_err(|_| StoreError::Corrupt(format!("{column} is negative: {value}")))
}

fn parse_event_type(s: &str) -> Result<PaymentEventType, StoreError> {
    let all = [
        PaymentEventType::IntentCreated,
        PaymentEventType::TxSubmitted,
        PaymentEventType::VerificationAttempted,
        PaymentEventType::VerificationPending,
        PaymentEventType::PaymentCredited,
        PaymentEventType::PaymentRejected,
        PaymentEventType::PaymentFailed,
    ];
    all.into_iter()
        .find(|t| t.as_str() == s)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown event type: {s}")))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn row() -> AttemptRow {
        let now = Utc::now();
        AttemptRow {
            id: Uuid::new_v4(),
            tenant_id: "tenant-a".to_string(),
            chain_id: 8453,
            tx_hash: Some("0xabc".to_string()),
            from_address: "0xa".to_string(),
            token: "0xc".to_string(),
            to_address: "0xb".to_string(),
            amount_raw: 5_000_000,
            amount_usd_cents: 500,
            status: "PENDING_UNVERIFIED".to_string(),
            error_code: Some("RPC_ERROR".to_string()),
            expires_at: None,
            submitted_at: Some(now),
            last_verify_attempt_at: Some(now),
            verify_attempt_count: 3,
            created_at: now,
            updated_at: now,
            version: 4,
        }
    }

    #[test]
    fn attempt_row_converts() {
        let Ok(attempt) = PaymentAttempt::try_from(row()) else {
            panic!("row should convert");
        };
        assert_eq!(attempt.status, AttemptStatus::PendingUnverified);
        assert_eq!(attempt.error_code, Some(ErrorCode::RpcError));
        assert_eq!(attempt.verify_attempt_count, 3);
        assert_eq!(attempt.version, 4);
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let mut bad = row();
        bad.status = "SETTLED".to_string();
        assert!(matches!(
            PaymentAttempt::try_from(bad),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn negative_amount_is_corrupt() {
        let mut bad = row();
        bad.amount_raw = -1;
        assert!(matches!(
            PaymentAttempt::try_from(bad),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn event_types_round_trip_through_strings() {
        assert_eq!(
            parse_event_type("verification_pending").ok(),
            Some(PaymentEventType::VerificationPending)
        );
        assert!(parse_event_type("refund_issued").is_err());
    }

    #[test]
    fn bigint_bound_is_checked() {
        assert_eq!(to_bigint(7, "x"), Ok(7));
        assert!(to_bigint(u64::MAX, "x").is_err());
    }
}
