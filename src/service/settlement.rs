//! Settlement: the only code path that marks an attempt `CREDITED`.

use std::sync::Arc;

use alloy::primitives::U256;

use crate::config::PaymentConfig;
use crate::domain::{
    AttemptId, AttemptStatus, Clock, LedgerCredit, PaymentEvent, PaymentEventType,
    SettlementOutcome,
};
use crate::error::PaymentError;
use crate::persistence::{AttemptStore, StoreError};

/// How often a settlement is retried after losing a version race to a
/// concurrent verifier bookkeeping write.
const MAX_VERSION_RETRIES: usize = 3;

/// Commits ledger credits for verified attempts.
///
/// Every commit goes through [`AttemptStore::commit_settlement`], which
/// writes the ledger entry, the balance, the `CREDITED` transition and the
/// audit event in one transaction keyed by the attempt's settlement
/// reference. Calling [`Self::confirm_payment`] any number of times, from
/// any number of tasks, credits at most once.
#[derive(Debug, Clone)]
pub struct SettlementCoordinator {
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
    config: Arc<PaymentConfig>,
}

impl SettlementCoordinator {
    /// Creates a coordinator.
    #[must_use]
    pub fn new(
        store: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
        config: Arc<PaymentConfig>,
    ) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Credits the tenant for a verified attempt and returns the resulting
    /// status.
    ///
    /// Already-credited attempts return `CREDITED` without writing. Other
    /// terminal attempts are returned as they are; they can never be
    /// credited.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::AttemptNotFound`] for an unknown id,
    /// [`PaymentError::Internal`] if no transaction is bound or the verified
    /// amount is below the expected amount, and
    /// [`PaymentError::Persistence`] on storage failure.
    pub async fn confirm_payment(
        &self,
        attempt_id: AttemptId,
        verified_amount: U256,
    ) -> Result<AttemptStatus, PaymentError> {
        let mut retries = 0;
        loop {
            let attempt = self.store.load_attempt(attempt_id).await?;
            if attempt.status != AttemptStatus::PendingUnverified {
                return Ok(attempt.status);
            }
            if verified_amount < U256::from(attempt.amount_raw) {
                return Err(PaymentError::Internal(format!(
                    "verified amount {verified_amount} below expected {}",
                    attempt.amount_raw
                )));
            }
            let reference = attempt.settlement_reference().ok_or_else(|| {
                PaymentError::Internal(format!("attempt {attempt_id} has no bound transaction"))
            })?;
            let amount = attempt
                .amount_usd_cents
                .checked_mul(self.config.credits_per_cent)
                .and_then(|credit| i64::try_from(credit).ok())
                .ok_or_else(|| PaymentError::Internal("credit amount overflows".to_string()))?;

            let now = self.clock.now();
            let mut credited = attempt.clone();
            credited.mark_credited(now)?;
            let credit = LedgerCredit {
                reference: reference.clone(),
                tenant_id: attempt.tenant_id.clone(),
                attempt_id,
                amount,
            };
            let event = PaymentEvent::new(
                attempt_id,
                PaymentEventType::PaymentCredited,
                Some(attempt.status),
                AttemptStatus::Credited,
                now,
            )
            .with_metadata(serde_json::json!({
                "reference": reference,
                "credit": amount,
                "verified_amount": verified_amount.to_string(),
            }));

            match self.store.commit_settlement(&credited, &credit, &event).await {
                Ok(SettlementOutcome::Credited(entry)) => {
                    tracing::info!(
                        %attempt_id,
                        tenant_id = %entry.tenant_id,
                        reference = %entry.reference,
                        credit = entry.amount,
                        balance_after = entry.balance_after,
                        "payment credited"
                    );
                    return Ok(AttemptStatus::Credited);
                }
                Ok(SettlementOutcome::AlreadySettled(entry)) => {
                    tracing::debug!(%attempt_id, reference = %entry.reference, "already settled");
                    let current = self.store.load_attempt(attempt_id).await?;
                    return Ok(current.status);
                }
                Err(StoreError::VersionConflict(_)) if retries < MAX_VERSION_RETRIES => {
                    retries += 1;
                    tracing::debug!(%attempt_id, retries, "settlement lost version race, retrying");
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}
