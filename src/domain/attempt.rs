//! Payment attempt aggregate and its state machine.
//!
//! A [`PaymentAttempt`] moves through
//!
//! ```text
//! CREATED_INTENT ──submit──▶ PENDING_UNVERIFIED ──verified──▶ CREDITED
//!       │                          │
//!       └──expired──▶ FAILED ◀─────┤ (reverted / polling timeout)
//!                                  └──mismatch──▶ REJECTED
//! ```
//!
//! Every mutator checks the transition table first, so a terminal attempt
//! can never be modified through this type.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{AttemptId, ErrorCode, TenantId};

/// Lifecycle status of a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    /// Intent created; no transaction bound yet.
    CreatedIntent,
    /// Transaction bound; waiting for on-chain verification.
    PendingUnverified,
    /// Ledger credited. Terminal.
    Credited,
    /// On-chain transfer did not match the attempt. Terminal.
    Rejected,
    /// Expired, reverted or never confirmed. Terminal.
    Failed,
}

impl AttemptStatus {
    /// Returns the persisted/serialized string form.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreatedIntent => "CREATED_INTENT",
            Self::PendingUnverified => "PENDING_UNVERIFIED",
            Self::Credited => "CREDITED",
            Self::Rejected => "REJECTED",
            Self::Failed => "FAILED",
        }
    }

    /// Returns `true` for states no transition may leave.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Credited | Self::Rejected | Self::Failed)
    }

    /// Returns `true` if `self → next` is an edge of the state machine.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::CreatedIntent, Self::PendingUnverified)
                | (Self::CreatedIntent, Self::Failed)
                | (Self::PendingUnverified, Self::Credited)
                | (Self::PendingUnverified, Self::Rejected)
                | (Self::PendingUnverified, Self::Failed)
        )
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = TransitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATED_INTENT" => Ok(Self::CreatedIntent),
            "PENDING_UNVERIFIED" => Ok(Self::PendingUnverified),
            "CREDITED" => Ok(Self::Credited),
            "REJECTED" => Ok(Self::Rejected),
            "FAILED" => Ok(Self::Failed),
            other => Err(TransitionError::UnknownStatus(other.to_string())),
        }
    }
}

/// Rejected state machine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The requested edge does not exist.
    #[error("illegal transition {from} -> {to}")]
    Illegal {
        /// Current status.
        from: AttemptStatus,
        /// Requested status.
        to: AttemptStatus,
    },
    /// The operation requires a different current status.
    #[error("operation not allowed in status {0}")]
    WrongStatus(AttemptStatus),
    /// A persisted status string was not recognised.
    #[error("unknown attempt status: {0}")]
    UnknownStatus(String),
}

/// One payment try, the unit of state-machine tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentAttempt {
    /// Attempt identifier.
    pub id: AttemptId,
    /// Owning tenant; every read and write is scoped by it.
    pub tenant_id: TenantId,
    /// Canonical chain id captured at creation.
    pub chain_id: u64,
    /// Bound transaction hash, lowercase `0x`-prefixed. Set once on submit.
    pub tx_hash: Option<String>,
    /// Tenant wallet address captured at creation.
    pub from_address: String,
    /// Canonical token contract address.
    pub token: String,
    /// Canonical recipient address.
    pub to_address: String,
    /// Expected amount in the token's smallest unit.
    pub amount_raw: u64,
    /// Requested amount in US cents.
    pub amount_usd_cents: u64,
    /// Current lifecycle status.
    pub status: AttemptStatus,
    /// Reason for a `REJECTED` / `FAILED` outcome.
    pub error_code: Option<ErrorCode>,
    /// Intent deadline; only honored while `CREATED_INTENT`.
    pub expires_at: Option<DateTime<Utc>>,
    /// When the transaction hash was bound. Never changes once set.
    pub submitted_at: Option<DateTime<Utc>>,
    /// When the verifier was last called for this attempt.
    pub last_verify_attempt_at: Option<DateTime<Utc>>,
    /// Number of verifier calls made. Never decreases.
    pub verify_attempt_count: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Optimistic concurrency version, bumped by the store on every update.
    pub version: i64,
}

impl PaymentAttempt {
    /// Returns `true` if the intent deadline has passed while no
    /// transaction is bound yet.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == AttemptStatus::CreatedIntent
            && self.expires_at.is_some_and(|deadline| now > deadline)
    }

    /// Returns `true` if the pending window or the verification budget is
    /// exhausted.
    #[must_use]
    pub fn pending_timed_out(
        &self,
        now: DateTime<Utc>,
        pending_ttl: Duration,
        max_attempts: u32,
    ) -> bool {
        if self.status != AttemptStatus::PendingUnverified {
            return false;
        }
        let window_elapsed = self
            .submitted_at
            .is_some_and(|submitted| now - submitted > pending_ttl);
        window_elapsed || self.verify_attempt_count > max_attempts
    }

    /// Returns `true` if at least `throttle` has passed since the last
    /// verifier call (or no call was ever made).
    #[must_use]
    pub fn verify_due(&self, now: DateTime<Utc>, throttle: Duration) -> bool {
        self.last_verify_attempt_at
            .is_none_or(|last| now - last >= throttle)
    }

    /// Ledger idempotency key `"{chain_id}:{tx_hash}"`, once a hash is bound.
    #[must_use]
    pub fn settlement_reference(&self) -> Option<String> {
        self.tx_hash
            .as_ref()
            .map(|hash| format!("{}:{hash}", self.chain_id))
    }

    /// Binds `tx_hash`, clears the intent deadline, stamps `submitted_at`
    /// and moves to `PENDING_UNVERIFIED`.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] unless the attempt is `CREATED_INTENT`.
    pub fn bind_tx(&mut self, tx_hash: String, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.transition(AttemptStatus::PendingUnverified, None, now)?;
        self.tx_hash = Some(tx_hash);
        self.expires_at = None;
        if self.submitted_at.is_none() {
            self.submitted_at = Some(now);
        }
        Ok(())
    }

    /// Counts one verifier call.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::WrongStatus`] unless the attempt is
    /// `PENDING_UNVERIFIED`.
    pub fn record_verify_attempt(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        if self.status != AttemptStatus::PendingUnverified {
            return Err(TransitionError::WrongStatus(self.status));
        }
        self.verify_attempt_count = self.verify_attempt_count.saturating_add(1);
        self.last_verify_attempt_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Moves to a non-credit status `next`, recording `error_code`.
    ///
    /// `CREDITED` is only reachable through [`Self::mark_credited`], which
    /// the settlement transaction uses.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] if `status → next` is not an
    /// edge of the state machine or `next` is `CREDITED`.
    pub(crate) fn transition(
        &mut self,
        next: AttemptStatus,
        error_code: Option<ErrorCode>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if next == AttemptStatus::Credited {
            return Err(TransitionError::Illegal {
                from: self.status,
                to: next,
            });
        }
        self.apply(next, error_code, now)
    }

    /// Moves `PENDING_UNVERIFIED → CREDITED`. Only settlement calls this,
    /// inside the transaction that writes the ledger entry.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError::Illegal`] unless the attempt is
    /// `PENDING_UNVERIFIED`.
    pub(crate) fn mark_credited(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.apply(AttemptStatus::Credited, None, now)
    }

    fn apply(
        &mut self,
        next: AttemptStatus,
        error_code: Option<ErrorCode>,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.error_code = error_code;
        self.updated_at = now;
        Ok(())
    }
}
