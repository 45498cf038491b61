//! Credit ledger rows written by settlement.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{AttemptId, TenantId};

/// One credit written for one settled attempt.
///
/// `reference` is `"{chain_id}:{tx_hash}"` and is unique across the ledger,
/// which is what makes settlement exactly-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    /// Idempotency key.
    pub reference: String,
    /// Credited tenant.
    pub tenant_id: TenantId,
    /// Attempt that funded the credit.
    pub attempt_id: AttemptId,
    /// Credit delta.
    pub amount: i64,
    /// Tenant balance right after this entry.
    pub balance_after: i64,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}

/// A credit to be committed together with the `CREDITED` transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCredit {
    /// Idempotency key.
    pub reference: String,
    /// Tenant to credit.
    pub tenant_id: TenantId,
    /// Attempt being settled.
    pub attempt_id: AttemptId,
    /// Credit delta.
    pub amount: i64,
}

/// Result of an atomic settlement commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// This call wrote the ledger entry.
    Credited(LedgerEntry),
    /// The reference was already settled; nothing was written.
    AlreadySettled(LedgerEntry),
}

impl SettlementOutcome {
    /// The ledger entry for the reference, new or pre-existing.
    #[must_use]
    pub fn entry(&self) -> &LedgerEntry {
        match self {
            Self::Credited(entry) | Self::AlreadySettled(entry) => entry,
        }
    }
}
