//! Payment intent creation.

use std::sync::Arc;

use crate::config::PaymentConfig;
use crate::domain::{
    AttemptId, AttemptStatus, Clock, PaymentAttempt, PaymentEvent, PaymentEventType, Tenant,
};
use crate::error::PaymentError;
use crate::persistence::AttemptStore;

/// Creates attempts in `CREATED_INTENT`.
///
/// The chain, token and recipient always come from the canonical
/// [`PaymentConfig`], never from the request. The sender is the tenant's
/// authenticated wallet.
#[derive(Debug, Clone)]
pub struct PaymentIntentService {
    store: Arc<dyn AttemptStore>,
    clock: Arc<dyn Clock>,
    config: Arc<PaymentConfig>,
}

impl PaymentIntentService {
    /// Creates the service.
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

    /// Creates an intent to pay `amount_usd_cents`.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::AmountOutOfBounds`] (nothing is written) if
    /// the amount is outside `[min_cents, max_cents]`, and
    /// [`PaymentError::Persistence`] on storage failure.
    pub async fn create_intent(
        &self,
        tenant: &Tenant,
        amount_usd_cents: u64,
    ) -> Result<PaymentAttempt, PaymentError> {
        let (min, max) = (self.config.min_cents, self.config.max_cents);
        if !(min..=max).contains(&amount_usd_cents) {
            return Err(PaymentError::AmountOutOfBounds {
                amount: amount_usd_cents,
                min,
                max,
            });
        }
        let amount_raw = amount_usd_cents
            .checked_mul(self.config.amount_scale)
            .ok_or_else(|| PaymentError::Internal("raw amount overflows".to_string()))?;

        let now = self.clock.now();
        let attempt = PaymentAttempt {
            id: AttemptId::new(),
            tenant_id: tenant.id.clone(),
            chain_id: self.config.chain_id,
            tx_hash: None,
            from_address: tenant.wallet_address.clone(),
            token: self.config.token_address.clone(),
            to_address: self.config.recipient_address.clone(),
            amount_raw,
            amount_usd_cents,
            status: AttemptStatus::CreatedIntent,
            error_code: None,
            expires_at: Some(now + self.config.intent_ttl),
            submitted_at: None,
            last_verify_attempt_at: None,
            verify_attempt_count: 0,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let event = PaymentEvent::new(
            attempt.id,
            PaymentEventType::IntentCreated,
            None,
            attempt.status,
            now,
        )
        .with_metadata(serde_json::json!({
            "amount_usd_cents": amount_usd_cents,
            "amount_raw": amount_raw,
        }));
        self.store.insert_attempt(&attempt, &event).await?;

        tracing::info!(
            attempt_id = %attempt.id,
            tenant_id = %attempt.tenant_id,
            amount_usd_cents,
            amount_raw,
            "payment intent created"
        );
        Ok(attempt)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::service::testing::{Wiring, test_config, test_tenant};
    use chrono::Duration;

    #[tokio::test]
    async fn raw_amount_uses_integer_scale() {
        let w = Wiring::new(test_config(), Vec::new());
        let service = PaymentIntentService::new(w.store(), w.clock(), w.config());

        let Ok(attempt) = service.create_intent(&test_tenant(), 500).await else {
            panic!("create failed");
        };
        assert_eq!(attempt.amount_raw, 5_000_000);
        assert_eq!(attempt.status, AttemptStatus::CreatedIntent);
        assert_eq!(attempt.expires_at, Some(w.clock.now() + Duration::minutes(30)));
        assert_eq!(attempt.from_address, test_tenant().wallet_address);
        assert_eq!(attempt.to_address, test_config().recipient_address);

        let Ok(events) = w.memory.list_events(attempt.id).await else {
            panic!("events missing");
        };
        assert_eq!(events.len(), 1);
        assert_eq!(
            events.first().map(|e| e.event_type),
            Some(PaymentEventType::IntentCreated)
        );
    }

    #[tokio::test]
    async fn out_of_bounds_amount_writes_nothing() {
        let w = Wiring::new(test_config(), Vec::new());
        let service = PaymentIntentService::new(w.store(), w.clock(), w.config());

        for amount in [0, 99, 100_001] {
            let result = service.create_intent(&test_tenant(), amount).await;
            assert!(matches!(
                result,
                Err(PaymentError::AmountOutOfBounds { amount: a, .. }) if a == amount
            ));
        }
        assert!(w.memory.is_empty().await);

        assert!(service.create_intent(&test_tenant(), 100).await.is_ok());
        assert!(service.create_intent(&test_tenant(), 100_000).await.is_ok());
        assert_eq!(w.memory.len().await, 2);
    }
}
