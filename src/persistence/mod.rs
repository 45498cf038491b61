//! Persistence layer: payment attempts, the audit event log, and the
//! credit ledger.
//!
//! [`AttemptStore`] is the only way services touch durable state. Two
//! implementations exist: [`postgres::PostgresAttemptStore`] (`sqlx::PgPool`)
//! and [`memory::MemoryAttemptStore`] (process memory, for single-instance
//! runs and tests).
//!
//! # Concurrency
//!
//! Attempt rows carry a `version`. [`AttemptStore::update_attempt`] and
//! [`AttemptStore::commit_settlement`] only succeed if the stored version
//! equals the caller's copy, so two writers racing on a stale read cannot
//! both win. Settlement additionally serializes on the tenant's balance row.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::{
    AttemptId, LedgerCredit, LedgerEntry, PaymentAttempt, PaymentEvent, SettlementOutcome,
    TenantId,
};

pub use memory::MemoryAttemptStore;
pub use postgres::PostgresAttemptStore;

/// Persistence failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No attempt with this id (for this tenant).
    #[error("attempt not found: {0}")]
    NotFound(AttemptId),
    /// The row changed since it was read.
    #[error("attempt {0} was modified concurrently")]
    VersionConflict(AttemptId),
    /// Another attempt already owns `(chain_id, tx_hash)`.
    #[error("transaction {tx_hash} on chain {chain_id} is bound to another attempt")]
    TxHashTaken {
        /// Chain id.
        chain_id: u64,
        /// Transaction hash.
        tx_hash: String,
    },
    /// A stored row does not decode into the domain model.
    #[error("corrupt row: {0}")]
    Corrupt(String),
    /// Driver or connection failure.
    #[error("database error: {0}")]
    Database(String),
}

/// Durable repository for attempts, events and settlement. No business
/// rules live here beyond the uniqueness and version guards.
#[async_trait]
pub trait AttemptStore: Send + Sync + Debug {
    /// Inserts a new attempt together with its creation event.
    async fn insert_attempt(
        &self,
        attempt: &PaymentAttempt,
        event: &PaymentEvent,
    ) -> Result<(), StoreError>;

    /// Loads an attempt owned by `tenant_id`. Attempts of other tenants are
    /// reported as [`StoreError::NotFound`].
    async fn get_attempt(
        &self,
        tenant_id: &TenantId,
        id: AttemptId,
    ) -> Result<PaymentAttempt, StoreError>;

    /// Loads an attempt without tenant scoping. Internal use only.
    async fn load_attempt(&self, id: AttemptId) -> Result<PaymentAttempt, StoreError>;

    /// Finds the attempt that owns `(chain_id, tx_hash)`, if any.
    async fn find_by_tx_hash(
        &self,
        chain_id: u64,
        tx_hash: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError>;

    /// Writes `attempt` if the stored version equals `attempt.version`, and
    /// appends `event` in the same transaction. Returns the stored attempt
    /// with its new version.
    async fn update_attempt(
        &self,
        attempt: &PaymentAttempt,
        event: &PaymentEvent,
    ) -> Result<PaymentAttempt, StoreError>;

    /// Appends an event without touching the attempt.
    async fn append_event(&self, event: &PaymentEvent) -> Result<(), StoreError>;

    /// Returns an attempt's events in insertion order.
    async fn list_events(&self, id: AttemptId) -> Result<Vec<PaymentEvent>, StoreError>;

    /// Atomically: inserts the ledger entry for `credit.reference` unless it
    /// exists, bumps the tenant balance under a row lock, writes `attempt`
    /// (already moved to `CREDITED`) with the version guard, and appends
    /// `event`. If the reference already exists nothing is written and the
    /// existing entry is returned.
    async fn commit_settlement(
        &self,
        attempt: &PaymentAttempt,
        credit: &LedgerCredit,
        event: &PaymentEvent,
    ) -> Result<SettlementOutcome, StoreError>;

    /// Looks up a ledger entry by reference.
    async fn ledger_entry(&self, reference: &str) -> Result<Option<LedgerEntry>, StoreError>;

    /// Current credit balance of a tenant (zero if never credited).
    async fn balance(&self, tenant_id: &TenantId) -> Result<i64, StoreError>;
}
