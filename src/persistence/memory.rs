//! In-process attempt store.
//!
//! All state sits behind one [`tokio::sync::RwLock`]. Every mutating call
//! holds the write lock for its whole duration, which gives the same
//! all-or-nothing behaviour as a database transaction within one process.
//! State is lost on restart; use [`super::PostgresAttemptStore`] for
//! anything that must survive one or run on several instances.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{AttemptStore, StoreError};
use crate::domain::{
    AttemptId, LedgerCredit, LedgerEntry, PaymentAttempt, PaymentEvent, SettlementOutcome,
    TenantId,
};

#[derive(Debug, Default)]
struct MemoryState {
    attempts: HashMap<AttemptId, PaymentAttempt>,
    tx_index: HashMap<(u64, String), AttemptId>,
    events: Vec<PaymentEvent>,
    ledger: HashMap<String, LedgerEntry>,
    balances: HashMap<TenantId, i64>,
}

impl MemoryState {
    /// Validates the version and tx-hash guards, then stores `attempt` with
    /// a bumped version.
    fn write_attempt(&mut self, attempt: &PaymentAttempt) -> Result<PaymentAttempt, StoreError> {
        let current = self
            .attempts
            .get(&attempt.id)
            .ok_or(StoreError::NotFound(attempt.id))?;
        if current.version != attempt.version {
            return Err(StoreError::VersionConflict(attempt.id));
        }
        if let Some(hash) = &attempt.tx_hash {
            let key = (attempt.chain_id, hash.clone());
            match self.tx_index.get(&key) {
                Some(owner) if *owner != attempt.id => {
                    return Err(StoreError::TxHashTaken {
                        chain_id: attempt.chain_id,
                        tx_hash: hash.clone(),
                    });
                }
                Some(_) => {}
                None => {
                    self.tx_index.insert(key, attempt.id);
                }
            }
        }
        let mut stored = attempt.clone();
        stored.version = attempt.version.saturating_add(1);
        self.attempts.insert(stored.id, stored.clone());
        Ok(stored)
    }
}

/// Attempt store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryAttemptStore {
    state: RwLock<MemoryState>,
}

impl MemoryAttemptStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored attempts.
    pub async fn len(&self) -> usize {
        self.state.read().await.attempts.len()
    }

    /// Returns `true` if no attempt is stored.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.attempts.is_empty()
    }

    /// Returns the number of ledger entries.
    pub async fn ledger_len(&self) -> usize {
        self.state.read().await.ledger.len()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn insert_attempt(
        &self,
        attempt: &PaymentAttempt,
        event: &PaymentEvent,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.attempts.contains_key(&attempt.id) {
            return Err(StoreError::Database(format!(
                "attempt {} already exists",
                attempt.id
            )));
        }
        state.attempts.insert(attempt.id, attempt.clone());
        state.events.push(event.clone());
        Ok(())
    }

    async fn get_attempt(
        &self,
        tenant_id: &TenantId,
        id: AttemptId,
    ) -> Result<PaymentAttempt, StoreError> {
        let state = self.state.read().await;
        state
            .attempts
            .get(&id)
            .filter(|attempt| attempt.tenant_id == *tenant_id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn load_attempt(&self, id: AttemptId) -> Result<PaymentAttempt, StoreError> {
        let state = self.state.read().await;
        state
            .attempts
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn find_by_tx_hash(
        &self,
        chain_id: u64,
        tx_hash: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .tx_index
            .get(&(chain_id, tx_hash.to_string()))
            .and_then(|id| state.attempts.get(id))
            .cloned())
    }

    async fn update_attempt(
        &self,
        attempt: &PaymentAttempt,
        event: &PaymentEvent,
    ) -> Result<PaymentAttempt, StoreError> {
        let mut state = self.state.write().await;
        let stored = state.write_attempt(attempt)?;
        state.events.push(event.clone());
        Ok(stored)
    }

    async fn append_event(&self, event: &PaymentEvent) -> Result<(), StoreError> {
        self.state.write().await.events.push(event.clone());
        Ok(())
    }

    async fn list_events(&self, id: AttemptId) -> Result<Vec<PaymentEvent>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|event| event.attempt_id == id)
            .cloned()
            .collect())
    }

    async fn commit_settlement(
        &self,
        attempt: &PaymentAttempt,
        credit: &LedgerCredit,
        event: &PaymentEvent,
    ) -> Result<SettlementOutcome, StoreError> {
        let mut state = self.state.write().await;
        if let Some(existing) = state.ledger.get(&credit.reference) {
            return Ok(SettlementOutcome::AlreadySettled(existing.clone()));
        }

        let balance_before = state.balances.get(&credit.tenant_id).copied().unwrap_or(0);
        let balance_after = balance_before
            .checked_add(credit.amount)
            .ok_or_else(|| StoreError::Database("balance overflow".to_string()))?;

        // Attempt write first: it is the only step that can fail, so nothing
        // else is touched unless it succeeds.
        state.write_attempt(attempt)?;

        let entry = LedgerEntry {
            reference: credit.reference.clone(),
            tenant_id: credit.tenant_id.clone(),
            attempt_id: credit.attempt_id,
            amount: credit.amount,
            balance_after,
            created_at: event.created_at,
        };
        state.ledger.insert(entry.reference.clone(), entry.clone());
        state.balances.insert(credit.tenant_id.clone(), balance_after);
        state.events.push(event.clone());
        Ok(SettlementOutcome::Credited(entry))
    }

    async fn ledger_entry(&self, reference: &str) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.state.read().await.ledger.get(reference).cloned())
    }

    async fn balance(&self, tenant_id: &TenantId) -> Result<i64, StoreError> {
        Ok(self
            .state
            .read()
            .await
            .balances
            .get(tenant_id)
            .copied()
            .unwrap_or(0))
    }
}
