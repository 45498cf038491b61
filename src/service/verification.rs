//! One verification pass over a pending attempt.
//!
//! Shared by submission (first pass) and the polling gate (later passes).
//! A pass is: local governance check, persist the verifier bookkeeping,
//! call the verifier under a deadline, then apply the outcome.

use std::sync::Arc;

use alloy::primitives::U256;

use crate::chain::{OnChainVerifier, PendingReason, VerificationOutcome, VerifyRequest};
use crate::config::PaymentConfig;
use crate::domain::{
    AttemptStatus, Clock, ErrorCode, PaymentAttempt, PaymentEvent, PaymentEventType,
};
use crate::error::PaymentError;
use crate::persistence::{AttemptStore, StoreError};

use super::SettlementCoordinator;

/// Runs verification passes and applies their outcome.
#[derive(Debug, Clone)]
pub struct VerificationRunner {
    store: Arc<dyn AttemptStore>,
    verifier: Arc<dyn OnChainVerifier>,
    clock: Arc<dyn Clock>,
    config: Arc<PaymentConfig>,
    settlement: SettlementCoordinator,
}

impl VerificationRunner {
    /// Creates a runner.
    #[must_use]
    pub fn new(
        store: Arc<dyn AttemptStore>,
        verifier: Arc<dyn OnChainVerifier>,
        clock: Arc<dyn Clock>,
        config: Arc<PaymentConfig>,
        settlement: SettlementCoordinator,
    ) -> Self {
        Self {
            store,
            verifier,
            clock,
            config,
            settlement,
        }
    }

    /// Runs one pass over `attempt` and returns its state afterwards.
    ///
    /// Attempts that are not `PENDING_UNVERIFIED` are returned unchanged.
    /// If another writer touched the attempt first, the pass stops and the
    /// winner's state is returned.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] on storage failure. Chain trouble never
    /// produces an error; it leaves the attempt pending.
    pub async fn run(&self, attempt: PaymentAttempt) -> Result<PaymentAttempt, PaymentError> {
        if attempt.status != AttemptStatus::PendingUnverified {
            return Ok(attempt);
        }

        if let Some(code) = self.governance_mismatch(&attempt) {
            tracing::warn!(
                attempt_id = %attempt.id,
                error_code = %code,
                "attempt no longer matches canonical payment config"
            );
            return self
                .finish(attempt, AttemptStatus::Rejected, code, serde_json::Value::Null)
                .await;
        }

        let Some(tx_hash) = attempt.tx_hash.clone() else {
            return Err(PaymentError::Internal(format!(
                "pending attempt {} has no transaction",
                attempt.id
            )));
        };

        let now = self.clock.now();
        let mut counted = attempt.clone();
        counted.record_verify_attempt(now)?;
        let event = PaymentEvent::new(
            attempt.id,
            PaymentEventType::VerificationAttempted,
            Some(attempt.status),
            attempt.status,
            now,
        )
        .with_metadata(serde_json::json!({ "verify_attempt_count": counted.verify_attempt_count }));
        let attempt = match self.store.update_attempt(&counted, &event).await {
            Ok(stored) => stored,
            Err(StoreError::VersionConflict(id)) => {
                tracing::debug!(attempt_id = %id, "verification skipped, attempt changed concurrently");
                return Ok(self.store.load_attempt(id).await?);
            }
            Err(err) => return Err(err.into()),
        };

        let request = verify_request(&attempt, &tx_hash)?;
        // Never shorter than the verifier's own retry budget; see
        // `PaymentConfig::check_verify_budget`.
        let outcome = tokio::time::timeout(
            self.config.submit_verify_timeout,
            self.verifier.verify(&request),
        )
        .await
        .unwrap_or_else(|_| {
            VerificationOutcome::Pending(PendingReason::RpcError {
                detail: "verification deadline exceeded".to_string(),
            })
        });

        match outcome {
            VerificationOutcome::Verified(transfer) => {
                tracing::info!(
                    attempt_id = %attempt.id,
                    block = transfer.block_number,
                    confirmations = transfer.confirmations,
                    "transfer verified"
                );
                self.settlement
                    .confirm_payment(attempt.id, transfer.actual_amount)
                    .await?;
                Ok(self.store.load_attempt(attempt.id).await?)
            }
            VerificationOutcome::Failed { error_code } => {
                let next = if error_code.is_validation() {
                    AttemptStatus::Rejected
                } else {
                    AttemptStatus::Failed
                };
                self.finish(attempt, next, error_code, serde_json::Value::Null)
                    .await
            }
            VerificationOutcome::Pending(reason) => {
                tracing::debug!(attempt_id = %attempt.id, ?reason, "verification pending");
                let event = PaymentEvent::new(
                    attempt.id,
                    PaymentEventType::VerificationPending,
                    Some(attempt.status),
                    attempt.status,
                    self.clock.now(),
                )
                .with_error(reason.error_code())
                .with_metadata(serde_json::to_value(&reason).unwrap_or_default());
                self.store.append_event(&event).await?;
                Ok(attempt)
            }
        }
    }

    /// Moves a pending attempt to a terminal non-credit status.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] on storage failure.
    pub(crate) async fn finish(
        &self,
        attempt: PaymentAttempt,
        next: AttemptStatus,
        error_code: ErrorCode,
        metadata: serde_json::Value,
    ) -> Result<PaymentAttempt, PaymentError> {
        let now = self.clock.now();
        let mut terminal = attempt.clone();
        terminal.transition(next, Some(error_code), now)?;
        let event = PaymentEvent::new(
            attempt.id,
            PaymentEventType::for_terminal(next),
            Some(attempt.status),
            next,
            now,
        )
        .with_error(Some(error_code))
        .with_metadata(metadata);

        match self.store.update_attempt(&terminal, &event).await {
            Ok(stored) => {
                tracing::info!(
                    attempt_id = %stored.id,
                    tenant_id = %stored.tenant_id,
                    status = %stored.status,
                    error_code = %error_code,
                    "payment attempt closed"
                );
                Ok(stored)
            }
            Err(StoreError::VersionConflict(id)) => Ok(self.store.load_attempt(id).await?),
            Err(err) => Err(err.into()),
        }
    }

    /// Compares the attempt's captured parameters against the canonical
    /// configuration. A mismatch is decided locally, never by the chain.
    fn governance_mismatch(&self, attempt: &PaymentAttempt) -> Option<ErrorCode> {
        if attempt.chain_id != self.config.chain_id || attempt.token != self.config.token_address {
            Some(ErrorCode::TokenTransferNotFound)
        } else if attempt.to_address != self.config.recipient_address {
            Some(ErrorCode::RecipientMismatch)
        } else {
            None
        }
    }
}

/// Converts the attempt's stored chain values into verifier types.
fn verify_request(
    attempt: &PaymentAttempt,
    tx_hash: &str,
) -> Result<VerifyRequest, PaymentError> {
    let malformed = |field: &str| {
        PaymentError::Internal(format!("attempt {} has malformed {field}", attempt.id))
    };
    Ok(VerifyRequest {
        chain_id: attempt.chain_id,
        tx_hash: tx_hash.parse().map_err(|_| malformed("tx_hash"))?,
        expected_to: attempt.to_address.parse().map_err(|_| malformed("to_address"))?,
        expected_token: attempt.token.parse().map_err(|_| malformed("token"))?,
        expected_amount: U256::from(attempt.amount_raw),
        expected_from: attempt
            .from_address
            .parse()
            .map_err(|_| malformed("from_address"))?,
    })
}
