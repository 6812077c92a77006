//! In-memory ledger store for testing and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

use crate::domain::{AuditLogEntry, Payment, Transaction};
use crate::ports::{LedgerStore, SettlementWrite, StoreError, StoreResult};

#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    transactions: Arc<RwLock<HashMap<Uuid, Transaction>>>,
    payments: Arc<RwLock<Vec<Payment>>>,
    audit_logs: Arc<RwLock<Vec<AuditLogEntry>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a transaction, as the wider application would have created it.
    pub fn insert_transaction(&self, tx: Transaction) {
        self.transactions.write().unwrap().insert(tx.id, tx);
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.payments.read().unwrap().clone()
    }

    pub fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit_logs.read().unwrap().clone()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) {
        self.transactions.write().unwrap().clear();
        self.payments.write().unwrap().clear();
        self.audit_logs.write().unwrap().clear();
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn get_transaction(&self, id: Uuid) -> StoreResult<Option<Transaction>> {
        Ok(self.transactions.read().unwrap().get(&id).cloned())
    }

    async fn has_payment_with_reference(
        &self,
        transaction_id: Uuid,
        reference: &str,
    ) -> StoreResult<bool> {
        Ok(self
            .payments
            .read()
            .unwrap()
            .iter()
            .any(|p| p.transaction_id == transaction_id && p.reference == reference))
    }

    async fn commit_settlement(&self, write: &SettlementWrite) -> StoreResult<()> {
        let mut transactions = self.transactions.write().unwrap();

        let current = transactions
            .get(&write.updated.id)
            .ok_or_else(|| StoreError::Conflict(format!("transaction {} gone", write.updated.id)))?;
        if current.amount_paid != write.previous.amount_paid {
            return Err(StoreError::Conflict(format!(
                "transaction {} changed concurrently",
                write.updated.id
            )));
        }

        transactions.insert(write.updated.id, write.updated.clone());
        self.payments.write().unwrap().push(write.payment.clone());
        self.audit_logs.write().unwrap().push(write.audit.clone());
        Ok(())
    }

    async fn payments_for_transaction(&self, transaction_id: Uuid) -> StoreResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.transaction_id == transaction_id)
            .cloned()
            .collect();
        payments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(payments)
    }

    async fn audit_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> StoreResult<Vec<AuditLogEntry>> {
        let payment_ids: Vec<Uuid> = self
            .payments
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.transaction_id == transaction_id)
            .map(|p| p.id)
            .collect();

        let mut entries: Vec<AuditLogEntry> = self
            .audit_logs
            .read()
            .unwrap()
            .iter()
            .filter(|a| payment_ids.contains(&a.entity_id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
