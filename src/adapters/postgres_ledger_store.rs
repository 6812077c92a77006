//! Postgres implementation of LedgerStore.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{AuditLogEntry, Payment, Transaction};
use crate::ports::{LedgerStore, SettlementWrite, StoreError, StoreResult};

/// Postgres-backed ledger store.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                StoreError::Unavailable(err.to_string())
            }
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict(err.to_string())
            }
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        let row = sqlx::query_as::<_, TransactionRow>("SELECT * FROM transactions WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;

        Ok(row.map(|r| r.into_domain()))
    }

    async fn has_payment_with_reference(
        &self,
        transaction_id: Uuid,
        reference: &str,
    ) -> StoreResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM payments WHERE transaction_id = $1 AND reference = $2)",
        )
        .bind(transaction_id)
        .bind(reference)
        .fetch_one(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(exists)
    }

    async fn commit_settlement(&self, write: &SettlementWrite) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(StoreError::from)?;

        let payment = &write.payment;
        sqlx::query(
            r#"
            INSERT INTO payments (
                id, transaction_id, client_id, amount, method, reference,
                notes, created_by, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(payment.id)
        .bind(payment.transaction_id)
        .bind(payment.client_id)
        .bind(&payment.amount)
        .bind(&payment.method)
        .bind(&payment.reference)
        .bind(&payment.notes)
        .bind(&payment.created_by)
        .bind(payment.created_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        // Guarded on the prior paid amount so racing events on the same
        // transaction serialize at the database rather than lose an update.
        let updated = &write.updated;
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET amount_paid = $2, pending_amount = $3, status = $4, updated_at = $5
            WHERE id = $1 AND amount_paid = $6
            "#,
        )
        .bind(updated.id)
        .bind(&updated.amount_paid)
        .bind(&updated.pending_amount)
        .bind(&updated.status)
        .bind(updated.updated_at)
        .bind(&write.previous.amount_paid)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "transaction {} changed concurrently",
                updated.id
            )));
        }

        let audit = &write.audit;
        sqlx::query(
            r#"
            INSERT INTO audit_logs (
                id, action, entity_type, entity_id, client_id,
                previous_value, new_value, performed_by, timestamp
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(audit.id)
        .bind(&audit.action)
        .bind(&audit.entity_type)
        .bind(audit.entity_id)
        .bind(audit.client_id)
        .bind(&audit.previous_value)
        .bind(&audit.new_value)
        .bind(&audit.performed_by)
        .bind(audit.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::from)?;

        tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn payments_for_transaction(&self, transaction_id: Uuid) -> StoreResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT * FROM payments WHERE transaction_id = $1 ORDER BY created_at",
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn audit_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        // Engine-authored entries reference the payment, so resolve through
        // the payments table.
        let rows = sqlx::query_as::<_, AuditLogRow>(
            r#"
            SELECT a.* FROM audit_logs a
            JOIN payments p ON a.entity_id = p.id
            WHERE p.transaction_id = $1
            ORDER BY a.timestamp DESC
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::from)?;

        Ok(rows.into_iter().map(|r| r.into_domain()).collect())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(())
    }
}

/// Internal row types for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    client_id: Uuid,
    total_amount: bigdecimal::BigDecimal,
    amount_paid: bigdecimal::BigDecimal,
    pending_amount: bigdecimal::BigDecimal,
    status: String,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl TransactionRow {
    fn into_domain(self) -> Transaction {
        Transaction {
            id: self.id,
            client_id: self.client_id,
            total_amount: self.total_amount,
            amount_paid: self.amount_paid,
            pending_amount: self.pending_amount,
            status: self.status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    transaction_id: Uuid,
    client_id: Uuid,
    amount: bigdecimal::BigDecimal,
    method: String,
    reference: String,
    notes: Option<String>,
    created_by: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> Payment {
        Payment {
            id: self.id,
            transaction_id: self.transaction_id,
            client_id: self.client_id,
            amount: self.amount,
            method: self.method,
            reference: self.reference,
            notes: self.notes,
            created_by: self.created_by,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: Uuid,
    action: String,
    entity_type: String,
    entity_id: Uuid,
    client_id: Uuid,
    previous_value: serde_json::Value,
    new_value: serde_json::Value,
    performed_by: String,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl AuditLogRow {
    fn into_domain(self) -> AuditLogEntry {
        AuditLogEntry {
            id: self.id,
            action: self.action,
            entity_type: self.entity_type,
            entity_id: self.entity_id,
            client_id: self.client_id,
            previous_value: self.previous_value,
            new_value: self.new_value,
            performed_by: self.performed_by,
            timestamp: self.timestamp,
        }
    }
}
