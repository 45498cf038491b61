//! Binding client-reported transaction hashes to attempts.

use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::domain::hex::normalize_tx_hash;
use crate::domain::{
    AttemptId, AttemptStatus, Clock, ErrorCode, PaymentAttempt, PaymentEvent, PaymentEventType,
    TenantId,
};
use crate::error::PaymentError;
use crate::persistence::{AttemptStore, StoreError};

use super::VerificationRunner;

/// Handles `submit` calls.
#[derive(Debug, Clone)]
pub struct SubmissionHandler {
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
    config: Arc<PaymentConfig>,
    runner: VerificationRunner,
}

impl SubmissionHandler {
    /// Creates a handler.
    #[must_use]
    pub fn new(
        store: Arc<dyn AttemptStore>,
        clock: Arc<dyn Clock>,
        config: Arc<PaymentConfig>,
        runner: VerificationRunner,
    ) -> Self {
        Self {
            store,
            clock,
            config,
            runner,
        }
    }

    /// Binds `tx_hash` to the tenant's attempt and runs the first
    /// verification pass.
    ///
    /// Resubmitting the hash already bound is a no-op that reports the
    /// current state, as is any submit on a terminal attempt. An intent
    /// past its deadline is closed as `FAILED / INTENT_EXPIRED`.
    ///
    /// # Errors
    ///
    /// - [`PaymentError::InvalidRequest`] for a malformed hash, or a hash
    ///   different from the one already bound.
    /// - [`PaymentError::AttemptNotFound`] if the attempt does not exist for
    ///   this tenant.
    /// - [`PaymentError::TxBoundElsewhere`] if another attempt owns the hash.
    /// - [`PaymentError::Persistence`] on storage failure.
    pub async fn submit_tx(
        &self,
        tenant_id: &TenantId,
        attempt_id: AttemptId,
        tx_hash: &str,
    ) -> Result<PaymentAttempt, PaymentError> {
        let tx_hash = normalize_tx_hash(tx_hash).ok_or_else(|| {
            PaymentError::InvalidRequest("tx_hash must be 0x followed by 64 hex digits".to_string())
        })?;
        let attempt = self.store.get_attempt(tenant_id, attempt_id).await?;
        let now = self.clock.now();

        if attempt.is_expired(now) {
            return self.expire(attempt).await;
        }
        if attempt.tx_hash.as_deref() == Some(tx_hash.as_str()) || attempt.status.is_terminal() {
            return Ok(attempt);
        }
        if attempt.tx_hash.is_some() {
            return Err(PaymentError::InvalidRequest(
                "attempt is already bound to a different transaction".to_string(),
            ));
        }

        if let Some(owner) = self
            .store
            .find_by_tx_hash(self.config.chain_id, &tx_hash)
            .await?
            && owner.id != attempt_id
        {
            tracing::warn!(
                %attempt_id,
                %tenant_id,
                owner = %owner.id,
                "transaction already bound to another attempt"
            );
            return Err(PaymentError::TxBoundElsewhere);
        }

        let mut bound = attempt.clone();
        bound.bind_tx(tx_hash.clone(), now)?;
        let event = PaymentEvent::new(
            attempt_id,
            PaymentEventType::TxSubmitted,
            Some(attempt.status),
            bound.status,
            now,
        )
        .with_metadata(serde_json::json!({ "tx_hash": tx_hash }));

        let stored = match self.store.update_attempt(&bound, &event).await {
            Ok(stored) => stored,
            Err(StoreError::VersionConflict(_)) => {
                let current = self.store.get_attempt(tenant_id, attempt_id).await?;
                return match current.tx_hash.as_deref() {
                    Some(bound) if bound != tx_hash => Err(PaymentError::InvalidRequest(
                        "attempt is already bound to a different transaction".to_string(),
                    )),
                    _ => Ok(current),
                };
            }
            Err(err) => return Err(err.into()),
        };
        tracing::info!(%attempt_id, %tenant_id, tx_hash = %tx_hash, "transaction submitted");

        match self.runner.run(stored.clone()).await {
            Ok(after) => Ok(after),
            Err(err) => {
                tracing::warn!(%attempt_id, error = %err, "first verification pass failed");
                Ok(stored)
            }
        }
    }

    async fn expire(&self, attempt: PaymentAttempt) -> Result<PaymentAttempt, PaymentError> {
        let now = self.clock.now();
        let mut failed = attempt.clone();
        failed.transition(AttemptStatus::Failed, Some(ErrorCode::IntentExpired), now)?;
        let event = PaymentEvent::new(
            attempt.id,
            PaymentEventType::PaymentFailed,
            Some(attempt.status),
            AttemptStatus::Failed,
            now,
        )
        .with_error(Some(ErrorCode::IntentExpired))
        .with_metadata(serde_json::json!({ "expires_at": attempt.expires_at }));

        match self.store.update_attempt(&failed, &event).await {
            Ok(stored) => {
                tracing::info!(attempt_id = %stored.id, "intent expired before submission");
                Ok(stored)
            }
            Err(StoreError::VersionConflict(id)) => Ok(self.store.load_attempt(id).await?),
            Err(err) => Err(err.into()),
        }
    }
}
