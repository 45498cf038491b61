//! Payment facade used by the HTTP layer.

use std::sync::Arc;

use crate::chain::OnChainVerifier;
use crate::config::{PaymentConfig, PaymentConfigView};
use crate::domain::{AttemptId, Clock, PaymentAttempt, PaymentEvent, Tenant, TenantId};
use crate::error::PaymentError;
use crate::persistence::AttemptStore;

use super::{
    PaymentIntentService, PollingGate, SettlementCoordinator, SubmissionHandler,
    VerificationRunner,
};

/// Entry point for every tenant-facing payment operation.
///
/// Stateless coordinator: all state lives behind the [`AttemptStore`], so
/// any number of instances can serve the same tenants.
#[derive(Debug, Clone)]
pub struct PaymentService {
    store: Arc<dyn AttemptStore>,
    config: Arc<PaymentConfig>,
    intents: PaymentIntentService,
    submissions: SubmissionHandler,
    polling: PollingGate,
    settlement: SettlementCoordinator,
}

impl PaymentService {
    /// Wires the payment components around one store, verifier and clock.
    #[must_use]
    pub fn new(
        store: Arc<dyn AttemptStore>,
        verifier: Arc<dyn OnChainVerifier>,
        clock: Arc<dyn Clock>,
        config: PaymentConfig,
    ) -> Self {
        let config = Arc::new(config);
        let settlement =
            SettlementCoordinator::new(Arc::clone(&store), Arc::clone(&clock), Arc::clone(&config));
        let runner = VerificationRunner::new(
            Arc::clone(&store),
            verifier,
            Arc::clone(&clock),
            Arc::clone(&config),
            settlement.clone(),
        );
        Self {
            intents: PaymentIntentService::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                Arc::clone(&config),
            ),
            submissions: SubmissionHandler::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                Arc::clone(&config),
                runner.clone(),
            ),
            polling: PollingGate::new(clock, Arc::clone(&config), runner),
            settlement,
            store,
            config,
        }
    }

    /// Returns the canonical payment configuration.
    #[must_use]
    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    /// Returns the public view of the canonical configuration.
    #[must_use]
    pub fn config_view(&self) -> PaymentConfigView {
        PaymentConfigView::from(self.config.as_ref())
    }

    /// Returns the settlement coordinator.
    #[must_use]
    pub fn settlement(&self) -> &SettlementCoordinator {
        &self.settlement
    }

    /// Creates an intent for the tenant.
    ///
    /// # Errors
    ///
    /// See [`PaymentIntentService::create_intent`].
    pub async fn create_intent(
        &self,
        tenant: &Tenant,
        amount_usd_cents: u64,
    ) -> Result<PaymentAttempt, PaymentError> {
        self.intents.create_intent(tenant, amount_usd_cents).await
    }

    /// Binds a transaction hash to the tenant's attempt.
    ///
    /// # Errors
    ///
    /// See [`SubmissionHandler::submit_tx`].
    pub async fn submit_tx(
        &self,
        tenant: &Tenant,
        attempt_id: AttemptId,
        tx_hash: &str,
    ) -> Result<PaymentAttempt, PaymentError> {
        self.submissions
            .submit_tx(&tenant.id, attempt_id, tx_hash)
            .await
    }

    /// Reads the tenant's attempt, letting the polling gate advance it
    /// first if it is pending.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::AttemptNotFound`] if the attempt does not
    /// exist for this tenant, [`PaymentError::Persistence`] on storage
    /// failure.
    pub async fn get_status(
        &self,
        tenant: &Tenant,
        attempt_id: AttemptId,
    ) -> Result<PaymentAttempt, PaymentError> {
        let attempt = self.store.get_attempt(&tenant.id, attempt_id).await?;
        self.polling.on_status_read(attempt).await
    }

    /// Returns the audit trail of the tenant's attempt.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::AttemptNotFound`] if the attempt does not
    /// exist for this tenant, [`PaymentError::Persistence`] on storage
    /// failure.
    pub async fn events(
        &self,
        tenant: &Tenant,
        attempt_id: AttemptId,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        let attempt = self.store.get_attempt(&tenant.id, attempt_id).await?;
        Ok(self.store.list_events(attempt.id).await?)
    }

    /// Returns the tenant's credit balance.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Persistence`] on storage failure.
    pub async fn balance(&self, tenant_id: &TenantId) -> Result<i64, PaymentError> {
        Ok(self.store.balance(tenant_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::{PendingReason, VerificationOutcome, VerifiedTransfer};
    use crate::domain::{AttemptStatus, ErrorCode};
    use crate::service::testing::{Wiring, test_config, test_tenant, tx_hash};
    use alloy::primitives::{Address, U256};
    use chrono::Duration;

    fn service(w: &Wiring) -> PaymentService {
        PaymentService::new(
            w.store(),
            Arc::clone(&w.verifier) as Arc<dyn OnChainVerifier>,
            w.clock(),
            test_config(),
        )
    }

    fn verified() -> VerificationOutcome {
        VerificationOutcome::Verified(VerifiedTransfer {
            actual_from: Address::repeat_byte(0xaa),
            actual_to: Address::repeat_byte(0xbb),
            actual_amount: U256::from(5_000_000u64),
            block_number: 10,
            confirmations: 3,
        })
    }

    #[tokio::test]
    async fn pending_then_verified_on_poll() {
        let w = Wiring::new(
            test_config(),
            vec![
                VerificationOutcome::Pending(PendingReason::InsufficientConfirmations {
                    confirmations: 1,
                    required: 3,
                }),
                verified(),
            ],
        );
        let service = service(&w);
        let tenant = test_tenant();

        let Ok(intent) = service.create_intent(&tenant, 500).await else {
            panic!("create failed");
        };
        let Ok(submitted) = service.submit_tx(&tenant, intent.id, &tx_hash('d')).await else {
            panic!("submit failed");
        };
        assert_eq!(submitted.status, AttemptStatus::PendingUnverified);

        // Inside the throttle window the poll does not call the verifier.
        let Ok(early) = service.get_status(&tenant, intent.id).await else {
            panic!("status failed");
        };
        assert_eq!(early.status, AttemptStatus::PendingUnverified);
        assert_eq!(w.verifier.calls(), 1);

        w.clock.advance(Duration::seconds(10));
        let Ok(later) = service.get_status(&tenant, intent.id).await else {
            panic!("status failed");
        };
        assert_eq!(later.status, AttemptStatus::Credited);
        assert_eq!(service.balance(&tenant.id).await.ok(), Some(500));

        let Ok(events) = service.events(&tenant, intent.id).await else {
            panic!("events failed");
        };
        let kinds: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(
            kinds,
            [
                "intent_created",
                "tx_submitted",
                "verification_attempted",
                "verification_pending",
                "verification_attempted",
                "payment_credited",
            ]
        );
    }

    #[tokio::test]
    async fn sender_mismatch_is_rejected_without_credit() {
        let w = Wiring::new(
            test_config(),
            vec![VerificationOutcome::Failed {
                error_code: ErrorCode::SenderMismatch,
            }],
        );
        let service = service(&w);
        let tenant = test_tenant();

        let Ok(intent) = service.create_intent(&tenant, 500).await else {
            panic!("create failed");
        };
        let _ = service.submit_tx(&tenant, intent.id, &tx_hash('e')).await;
        let Ok(status) = service.get_status(&tenant, intent.id).await else {
            panic!("status failed");
        };
        assert_eq!(status.status, AttemptStatus::Rejected);
        assert_eq!(status.error_code, Some(ErrorCode::SenderMismatch));
        assert_eq!(service.balance(&tenant.id).await.ok(), Some(0));
    }

    #[tokio::test]
    async fn status_of_other_tenant_is_not_found() {
        let w = Wiring::new(test_config(), Vec::new());
        let service = service(&w);
        let Ok(intent) = service.create_intent(&test_tenant(), 500).await else {
            panic!("create failed");
        };
        let intruder = Tenant {
            id: TenantId::new("tenant-b"),
            wallet_address: test_tenant().wallet_address,
        };
        assert!(matches!(
            service.get_status(&intruder, intent.id).await,
            Err(PaymentError::AttemptNotFound(_))
        ));
        assert!(matches!(
            service.events(&intruder, intent.id).await,
            Err(PaymentError::AttemptNotFound(_))
        ));
    }

    #[test]
    fn config_view_mirrors_canonical_config() {
        let w = Wiring::new(test_config(), Vec::new());
        let view = service(&w).config_view();
        assert_eq!(view.chain_id, 8453);
        assert_eq!(view.to, test_config().recipient_address);
    }
}
