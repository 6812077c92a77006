//! Ledger store port.
//!
//! The reconciliation engine is a pure client of this trait; the backing
//! store is a constructed dependency so tests can swap in a double. Any
//! implementation must apply a [`SettlementWrite`] as one unit: all three
//! record mutations land together or not at all, and the transaction update
//! must fail with [`StoreError::Conflict`] when the row no longer matches
//! the prior state the write was computed from.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{AuditLogEntry, Payment, Transaction};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),

    #[error("write conflict: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// One settlement unit for a single transaction.
#[derive(Debug, Clone)]
pub struct SettlementWrite {
    /// Transaction state the amounts were computed from.
    pub previous: Transaction,
    /// Transaction state to persist.
    pub updated: Transaction,
    pub payment: Payment,
    pub audit: AuditLogEntry,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>>;

    /// Whether a payment with this gateway reference is already recorded
    /// against the transaction. Backs the redelivery guard.
    async fn has_payment_with_reference(
        &self,
        transaction_id: Uuid,
        reference: &str,
    ) -> StoreResult<bool>;

    /// Atomic multi-record write: insert the payment, update the
    /// transaction, insert the audit entry.
    async fn commit_settlement(&self, write: &SettlementWrite) -> StoreResult<()>;

    async fn payments_for_transaction(&self, transaction_id: Uuid) -> StoreResult<Vec<Payment>>;

    async fn audit_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> StoreResult<Vec<AuditLogEntry>>;

    /// Connectivity probe for health reporting.
    async fn ping(&self) -> StoreResult<()>;
}
