//! PostgreSQL implementation of the persistence layer.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{ATTEMPT_COLUMNS, AttemptRow, EventRow, LedgerRow, to_bigint};
use super::{AttemptStore, StoreError};
use crate::domain::{
    AttemptId, LedgerCredit, LedgerEntry, PaymentAttempt, PaymentEvent, SettlementOutcome,
    TenantId,
};

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Name of the partial unique index on `(chain_id, tx_hash)`.
const TX_HASH_INDEX: &str = "payment_attempts_chain_tx_hash_key";

/// PostgreSQL-backed attempt store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresAttemptStore {
    pool: PgPool,
}

impl PostgresAttemptStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Maps a write failure, turning a violation of the tx-hash index into
/// [`StoreError::TxHashTaken`].
fn write_err(e: sqlx::Error, attempt: &PaymentAttempt) -> StoreError {
    if let sqlx::Error::Database(db) = &e
        && db.code().as_deref() == Some(UNIQUE_VIOLATION)
        && db.constraint() == Some(TX_HASH_INDEX)
    {
        return StoreError::TxHashTaken {
            chain_id: attempt.chain_id,
            tx_hash: attempt.tx_hash.clone().unwrap_or_default(),
        };
    }
    db_err(e)
}

async fn insert_event(
    tx: &mut Transaction<'_, Postgres>,
    event: &PaymentEvent,
) -> Result<(), StoreError> {
    sqlx::query(
        "INSERT INTO payment_events \
         (attempt_id, event_type, from_status, to_status, error_code, metadata, created_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(*event.attempt_id.as_uuid())
    .bind(event.event_type.as_str())
    .bind(event.from_status.map(|s| s.as_str()))
    .bind(event.to_status.as_str())
    .bind(event.error_code.map(|c| c.as_str()))
    .bind(&event.metadata)
    .bind(event.created_at)
    .execute(&mut **tx)
    .await
    .map_err(db_err)?;
    Ok(())
}

/// Writes every mutable attempt column guarded by `version`. Returns the
/// new version, or [`StoreError::VersionConflict`] if the guard did not
/// match.
async fn write_attempt(
    tx: &mut Transaction<'_, Postgres>,
    attempt: &PaymentAttempt,
) -> Result<i64, StoreError> {
    let new_version = sqlx::query_scalar::<_, i64>(
        "UPDATE payment_attempts SET \
             tx_hash = $3, status = $4, error_code = $5, expires_at = $6, submitted_at = $7, \
             last_verify_attempt_at = $8, verify_attempt_count = $9, updated_at = $10, \
             version = version + 1 \
         WHERE id = $1 AND version = $2 \
         RETURNING version",
    )
    .bind(*attempt.id.as_uuid())
    .bind(attempt.version)
    .bind(attempt.tx_hash.as_deref())
    .bind(attempt.status.as_str())
    .bind(attempt.error_code.map(|c| c.as_str()))
    .bind(attempt.expires_at)
    .bind(attempt.submitted_at)
    .bind(attempt.last_verify_attempt_at)
    .bind(i32::try_from(attempt.verify_attempt_count).unwrap_or(i32::MAX))
    .bind(attempt.updated_at)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| write_err(e, attempt))?;

    new_version.ok_or(StoreError::VersionConflict(attempt.id))
}

#[async_trait]
impl AttemptStore for PostgresAttemptStore {
    async fn insert_attempt(
        &self,
        attempt: &PaymentAttempt,
        event: &PaymentEvent,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        sqlx::query(
            "INSERT INTO payment_attempts \
             (id, tenant_id, chain_id, tx_hash, from_address, token, to_address, amount_raw, \
              amount_usd_cents, status, error_code, expires_at, submitted_at, \
              last_verify_attempt_at, verify_attempt_count, created_at, updated_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
        )
        .bind(*attempt.id.as_uuid())
        .bind(attempt.tenant_id.as_str())
        .bind(to_bigint(attempt.chain_id, "chain_id")?)
        .bind(attempt.tx_hash.as_deref())
        .bind(&attempt.from_address)
        .bind(&attempt.token)
        .bind(&attempt.to_address)
        .bind(to_bigint(attempt.amount_raw, "amount_raw")?)
        .bind(to_bigint(attempt.amount_usd_cents, "amount_usd_cents")?)
        .bind(attempt.status.as_str())
        .bind(attempt.error_code.map(|c| c.as_str()))
        .bind(attempt.expires_at)
        .bind(attempt.submitted_at)
        .bind(attempt.last_verify_attempt_at)
        .bind(i32::try_from(attempt.verify_attempt_count).unwrap_or(i32::MAX))
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .bind(attempt.version)
        .execute(&mut *tx)
        .await
        .map_err(|e| write_err(e, attempt))?;

        insert_event(&mut tx, event).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn get_attempt(
        &self,
        tenant_id: &TenantId,
        id: AttemptId,
    ) -> Result<PaymentAttempt, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM payment_attempts WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(*id.as_uuid())
        .bind(tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound(id))?;
        PaymentAttempt::try_from(row)
    }

    async fn load_attempt(&self, id: AttemptId) -> Result<PaymentAttempt, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM payment_attempts WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or(StoreError::NotFound(id))?;
        PaymentAttempt::try_from(row)
    }

    async fn find_by_tx_hash(
        &self,
        chain_id: u64,
        tx_hash: &str,
    ) -> Result<Option<PaymentAttempt>, StoreError> {
        let row = sqlx::query_as::<_, AttemptRow>(&format!(
            "SELECT {ATTEMPT_COLUMNS} FROM payment_attempts WHERE chain_id = $1 AND tx_hash = $2"
        ))
        .bind(to_bigint(chain_id, "chain_id")?)
        .bind(tx_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(PaymentAttempt::try_from).transpose()
    }

    async fn update_attempt(
        &self,
        attempt: &PaymentAttempt,
        event: &PaymentEvent,
    ) -> Result<PaymentAttempt, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let version = write_attempt(&mut tx, attempt).await?;
        insert_event(&mut tx, event).await?;
        tx.commit().await.map_err(db_err)?;

        let mut stored = attempt.clone();
        stored.version = version;
        Ok(stored)
    }

    async fn append_event(&self, event: &PaymentEvent) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        insert_event(&mut tx, event).await?;
        tx.commit().await.map_err(db_err)
    }

    async fn list_events(&self, id: AttemptId) -> Result<Vec<PaymentEvent>, StoreError> {
        let rows = sqlx::query_as::<_, EventRow>(
            "SELECT attempt_id, event_type, from_status, to_status, error_code, metadata, created_at \
             FROM payment_events WHERE attempt_id = $1 ORDER BY id ASC",
        )
        .bind(*id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.into_iter().map(PaymentEvent::try_from).collect()
    }

    async fn commit_settlement(
        &self,
        attempt: &PaymentAttempt,
        credit: &LedgerCredit,
        event: &PaymentEvent,
    ) -> Result<SettlementOutcome, StoreError> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Serialize settlements per tenant on the balance row.
        sqlx::query(
            "INSERT INTO credit_balances (tenant_id, balance, updated_at) \
             VALUES ($1, 0, $2) ON CONFLICT (tenant_id) DO NOTHING",
        )
        .bind(credit.tenant_id.as_str())
        .bind(event.created_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let balance_before = sqlx::query_scalar::<_, i64>(
            "SELECT balance FROM credit_balances WHERE tenant_id = $1 FOR UPDATE",
        )
        .bind(credit.tenant_id.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let balance_after = balance_before
            .checked_add(credit.amount)
            .ok_or_else(|| StoreError::Database("balance overflow".to_string()))?;

        let inserted = sqlx::query_as::<_, LedgerRow>(
            "INSERT INTO ledger_entries \
             (reference, tenant_id, attempt_id, amount, balance_after, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (reference) DO NOTHING \
             RETURNING reference, tenant_id, attempt_id, amount, balance_after, created_at",
        )
        .bind(&credit.reference)
        .bind(credit.tenant_id.as_str())
        .bind(*credit.attempt_id.as_uuid())
        .bind(credit.amount)
        .bind(balance_after)
        .bind(event.created_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(inserted) = inserted else {
            tx.rollback().await.map_err(db_err)?;
            let existing = self
                .ledger_entry(&credit.reference)
                .await?
                .ok_or_else(|| {
                    StoreError::Database(format!(
                        "ledger entry {} vanished after conflict",
                        credit.reference
                    ))
                })?;
            return Ok(SettlementOutcome::AlreadySettled(existing));
        };

        sqlx::query("UPDATE credit_balances SET balance = $2, updated_at = $3 WHERE tenant_id = $1")
            .bind(credit.tenant_id.as_str())
            .bind(balance_after)
            .bind(event.created_at)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        // Dropping `tx` on error rolls back the ledger insert as well.
        write_attempt(&mut tx, attempt).await?;
        insert_event(&mut tx, event).await?;
        tx.commit().await.map_err(db_err)?;

        Ok(SettlementOutcome::Credited(LedgerEntry::from(inserted)))
    }

    async fn ledger_entry(&self, reference: &str) -> Result<Option<LedgerEntry>, StoreError> {
        let row = sqlx::query_as::<_, LedgerRow>(
            "SELECT reference, tenant_id, attempt_id, amount, balance_after, created_at \
             FROM ledger_entries WHERE reference = $1",
        )
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.map(LedgerEntry::from))
    }

    async fn balance(&self, tenant_id: &TenantId) -> Result<i64, StoreError> {
        let balance = sqlx::query_scalar::<_, i64>(
            "SELECT balance FROM credit_balances WHERE tenant_id = $1",
        )
        .bind(tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(balance.unwrap_or(0))
    }
}

