//! Service layer: payment orchestration.
//!
//! Each component owns one step of the attempt lifecycle and talks to
//! durable state only through [`crate::persistence::AttemptStore`]:
//!
//! - [`PaymentIntentService`] creates intents.
//! - [`SubmissionHandler`] binds transaction hashes and runs the first
//!   verification pass.
//! - [`PollingGate`] times out or throttles verification on status reads.
//! - [`VerificationRunner`] performs one verification pass.
//! - [`SettlementCoordinator`] is the single path to `CREDITED`.
//!
//! [`PaymentService`] wires them together for the HTTP layer.

pub mod intent;
pub mod payment_service;
pub mod polling;
pub mod settlement;
pub mod submission;
pub mod verification;

pub use intent::PaymentIntentService;
pub use payment_service::PaymentService;
pub use polling::PollingGate;
pub use settlement::SettlementCoordinator;
pub use submission::SubmissionHandler;
pub use verification::VerificationRunner;

#[cfg(test)]
#[allow(clippy::panic)]
pub(crate) mod testing {
    //! Shared fixtures for service tests.

    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use super::{SettlementCoordinator, VerificationRunner};
    use crate::chain::{OnChainVerifier, PendingReason, VerificationOutcome, VerifyRequest};
    use crate::config::PaymentConfig;
    use crate::domain::attempt::tests::make_attempt;
    use crate::domain::{
        Clock, ManualClock, PaymentAttempt, PaymentEvent, PaymentEventType, Tenant, TenantId,
    };
    use crate::persistence::{AttemptStore, MemoryAttemptStore};

    pub(crate) fn test_config() -> PaymentConfig {
        PaymentConfig {
            chain_id: 8453,
            token_address: format!("0x{}", "c".repeat(40)),
            recipient_address: format!("0x{}", "b".repeat(40)),
            min_cents: 100,
            max_cents: 100_000,
            amount_scale: 10_000,
            credits_per_cent: 1,
            intent_ttl: Duration::minutes(30),
            pending_ttl: Duration::hours(24),
            verify_throttle: Duration::seconds(10),
            max_verify_attempts: 500,
            submit_verify_timeout: std::time::Duration::from_secs(1),
        }
    }

    pub(crate) fn test_tenant() -> Tenant {
        Tenant {
            id: TenantId::new("tenant-a"),
            wallet_address: format!("0x{}", "a".repeat(40)),
        }
    }

    pub(crate) fn tx_hash(fill: char) -> String {
        format!("0x{}", fill.to_string().repeat(64))
    }

    /// Inserts a fresh attempt and binds a hash derived from its id.
    pub(crate) async fn pending_attempt(store: &MemoryAttemptStore) -> PaymentAttempt {
        let now = Utc::now();
        let attempt = make_attempt(now);
        let created = PaymentEvent::new(
            attempt.id,
            PaymentEventType::IntentCreated,
            None,
            attempt.status,
            now,
        );
        let Ok(()) = store.insert_attempt(&attempt, &created).await else {
            panic!("insert failed");
        };
        let mut bound = attempt.clone();
        let hash = format!("0x{}{}", "0".repeat(32), attempt.id.as_uuid().simple());
        let Ok(()) = bound.bind_tx(hash, now) else {
            panic!("bind failed");
        };
        let Ok(stored) = store.update_attempt(&bound, &created).await else {
            panic!("update failed");
        };
        stored
    }

    /// Verifier that replays a script of outcomes. The last outcome repeats
    /// once the script runs out; an empty script answers `Pending`.
    #[derive(Debug)]
    pub(crate) struct ScriptedVerifier {
        outcomes: Mutex<VecDeque<VerificationOutcome>>,
        last: Mutex<Option<VerificationOutcome>>,
        calls: AtomicUsize,
        delay: Option<std::time::Duration>,
    }

    impl ScriptedVerifier {
        pub(crate) fn new(outcomes: Vec<VerificationOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                last: Mutex::new(None),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        pub(crate) fn with_delay(mut self, delay: std::time::Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn next(&self) -> VerificationOutcome {
            let Ok(mut outcomes) = self.outcomes.lock() else {
                panic!("poisoned");
            };
            let Ok(mut last) = self.last.lock() else {
                panic!("poisoned");
            };
            if let Some(outcome) = outcomes.pop_front() {
                *last = Some(outcome.clone());
                return outcome;
            }
            last.clone()
                .unwrap_or(VerificationOutcome::Pending(PendingReason::NotFound))
        }
    }

    #[async_trait]
    impl OnChainVerifier for ScriptedVerifier {
        async fn verify(&self, _request: &VerifyRequest) -> VerificationOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next()
        }
    }

    /// Memory store, manual clock and scripted verifier wired together.
    pub(crate) struct Wiring {
        pub(crate) memory: Arc<MemoryAttemptStore>,
        pub(crate) clock: Arc<ManualClock>,
        pub(crate) verifier: Arc<ScriptedVerifier>,
        config: Arc<PaymentConfig>,
    }

    impl Wiring {
        pub(crate) fn new(config: PaymentConfig, outcomes: Vec<VerificationOutcome>) -> Self {
            Self::with_verifier(config, ScriptedVerifier::new(outcomes))
        }

        pub(crate) fn with_verifier(config: PaymentConfig, verifier: ScriptedVerifier) -> Self {
            Self {
                memory: Arc::new(MemoryAttemptStore::new()),
                clock: Arc::new(ManualClock::new(Utc::now())),
                verifier: Arc::new(verifier),
                config: Arc::new(config),
            }
        }

        pub(crate) fn store(&self) -> Arc<dyn AttemptStore> {
            Arc::clone(&self.memory) as Arc<dyn AttemptStore>
        }

        pub(crate) fn clock(&self) -> Arc<dyn Clock> {
            Arc::clone(&self.clock) as Arc<dyn Clock>
        }

        pub(crate) fn config(&self) -> Arc<PaymentConfig> {
            Arc::clone(&self.config)
        }

        pub(crate) fn settlement(&self) -> SettlementCoordinator {
            SettlementCoordinator::new(self.store(), self.clock(), self.config())
        }

        pub(crate) fn runner(&self) -> VerificationRunner {
            VerificationRunner::new(
                self.store(),
                Arc::clone(&self.verifier) as Arc<dyn OnChainVerifier>,
                self.clock(),
                self.config(),
                self.settlement(),
            )
        }
    }
}
