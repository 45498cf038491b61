//! Status-read gate for pending attempts.

use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::domain::{AttemptStatus, Clock, ErrorCode, PaymentAttempt};
use crate::error::PaymentError;

use super::VerificationRunner;

/// Decides what a status read of a `PENDING_UNVERIFIED` attempt does: close
/// it on timeout, run a verification pass if the throttle allows, or
/// nothing.
///
/// All inputs (`submitted_at`, `last_verify_attempt_at`,
/// `verify_attempt_count`) come from the stored row, so the gate behaves
/// the same on every instance and across restarts.
#[derive(Debug, Clone)]
pub struct PollingGate {
    clock: Arc<dyn Clock>,
    config: Arc<PaymentConfig>,
    runner: VerificationRunner,
}

impl PollingGate {
    /// Creates a gate.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, config: Arc<PaymentConfig>, runner: VerificationRunner) -> Self {
        Self {
            clock,
            config,
            runner,
        }
    }

    /// Applies the gate to a freshly read attempt and returns the state to
    /// report.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError`] on storage failure.
    pub async fn on_status_read(
        &self,
        attempt: PaymentAttempt,
    ) -> Result<PaymentAttempt, PaymentError> {
        if attempt.status != AttemptStatus::PendingUnverified {
            return Ok(attempt);
        }

        let now = self.clock.now();
        if attempt.pending_timed_out(
            now,
            self.config.pending_ttl,
            self.config.max_verify_attempts,
        ) {
            let metadata = serde_json::json!({
                "verify_attempt_count": attempt.verify_attempt_count,
                "submitted_at": attempt.submitted_at,
            });
            return self
                .runner
                .finish(
                    attempt,
                    AttemptStatus::Failed,
                    ErrorCode::ReceiptNotFound,
                    metadata,
                )
                .await;
        }

        if !attempt.verify_due(now, self.config.verify_throttle) {
            return Ok(attempt);
        }
        self.runner.run(attempt).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::{PendingReason, VerificationOutcome};
    use crate::persistence::AttemptStore;
    use crate::service::testing::{Wiring, pending_attempt, test_config};
    use chrono::Duration;

    fn wiring(config: PaymentConfig) -> (Wiring, PollingGate) {
        let w = Wiring::new(
            config,
            vec![VerificationOutcome::Pending(PendingReason::NotFound)],
        );
        let gate = PollingGate::new(w.clock(), w.config(), w.runner());
        (w, gate)
    }

    #[tokio::test]
    async fn throttle_limits_verifier_calls() {
        let (w, gate) = wiring(test_config());
        let attempt = pending_attempt(&w.memory).await;

        let Ok(first) = gate.on_status_read(attempt).await else {
            panic!("first read failed");
        };
        assert_eq!(first.verify_attempt_count, 1);

        for _ in 0..5 {
            w.clock.advance(Duration::seconds(1));
            let Ok(current) = w.memory.load_attempt(first.id).await else {
                panic!("reload failed");
            };
            let _ = gate.on_status_read(current).await;
        }
        assert_eq!(w.verifier.calls(), 1);

        w.clock.advance(Duration::seconds(5));
        let Ok(current) = w.memory.load_attempt(first.id).await else {
            panic!("reload failed");
        };
        let Ok(after) = gate.on_status_read(current).await else {
            panic!("read failed");
        };
        assert_eq!(after.verify_attempt_count, 2);
        assert_eq!(w.verifier.calls(), 2);
    }

    #[tokio::test]
    async fn pending_window_elapses_to_receipt_not_found() {
        let (w, gate) = wiring(test_config());
        let attempt = pending_attempt(&w.memory).await;
        w.clock.advance(Duration::hours(25));

        let Ok(after) = gate.on_status_read(attempt).await else {
            panic!("read failed");
        };
        assert_eq!(after.status, AttemptStatus::Failed);
        assert_eq!(after.error_code, Some(ErrorCode::ReceiptNotFound));
        assert_eq!(w.verifier.calls(), 0);
    }

    #[tokio::test]
    async fn attempt_budget_exhaustion_fails() {
        let mut config = test_config();
        config.max_verify_attempts = 2;
        let (w, gate) = wiring(config);
        let mut current = pending_attempt(&w.memory).await;

        for _ in 0..3 {
            let Ok(next) = gate.on_status_read(current).await else {
                panic!("read failed");
            };
            w.clock.advance(Duration::seconds(10));
            current = next;
        }
        assert_eq!(current.verify_attempt_count, 3);
        assert_eq!(current.status, AttemptStatus::PendingUnverified);

        let Ok(closed) = gate.on_status_read(current).await else {
            panic!("read failed");
        };
        assert_eq!(closed.status, AttemptStatus::Failed);
        assert_eq!(closed.error_code, Some(ErrorCode::ReceiptNotFound));
        assert_eq!(w.verifier.calls(), 3);
    }
}
