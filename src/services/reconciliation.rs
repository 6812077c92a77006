//! Payment reconciliation engine.
//!
//! Applies an approved gateway confirmation to each referenced transaction:
//! bump the paid amount, derive the new status, and commit the payment
//! record, the transaction update, and the audit entry as one unit per
//! transaction. Transactions are handled strictly in sequence; the first
//! store failure aborts the remainder of the batch.

use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::transaction::status;
use crate::domain::{AuditLogEntry, Payment};
use crate::ports::{LedgerStore, SettlementWrite, StoreError};

/// Gateway statuses that settle money. Anything else is a no-op.
pub const APPROVED_STATUSES: [&str; 2] = ["approved", "APROBADA"];

/// A payment confirmation as reported by the gateway.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub status: String,
    pub amount: BigDecimal,
    pub reference: String,
    pub transaction_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    NotApproved,
    Processed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    pub outcome: ReconciliationOutcome,
    pub processed: usize,
    pub skipped_missing: usize,
    pub skipped_duplicate: usize,
}

impl ReconciliationReport {
    fn not_approved() -> Self {
        Self {
            outcome: ReconciliationOutcome::NotApproved,
            processed: 0,
            skipped_missing: 0,
            skipped_duplicate: 0,
        }
    }
}

#[derive(Clone)]
pub struct ReconciliationEngine {
    store: Arc<dyn LedgerStore>,
}

impl ReconciliationEngine {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    fn is_approved(gateway_status: &str) -> bool {
        APPROVED_STATUSES.contains(&gateway_status)
    }

    /// Settle one gateway event against every transaction it references.
    ///
    /// Returns `Err` only on a store write failure; by then every id before
    /// the failing one is committed and nothing after it was attempted.
    pub async fn reconcile(&self, event: &PaymentEvent) -> Result<ReconciliationReport, StoreError> {
        if !Self::is_approved(&event.status) {
            tracing::info!(status = %event.status, "not approved, skipping");
            return Ok(ReconciliationReport::not_approved());
        }

        let mut report = ReconciliationReport {
            outcome: ReconciliationOutcome::Processed,
            processed: 0,
            skipped_missing: 0,
            skipped_duplicate: 0,
        };

        for &tx_id in &event.transaction_ids {
            let Some(tx) = self.store.get_transaction(tx_id).await? else {
                tracing::warn!(transaction_id = %tx_id, "transaction not found, skipping");
                report.skipped_missing += 1;
                continue;
            };

            if !event.reference.is_empty()
                && self
                    .store
                    .has_payment_with_reference(tx_id, &event.reference)
                    .await?
            {
                tracing::info!(
                    transaction_id = %tx_id,
                    reference = %event.reference,
                    "payment already recorded for this reference, skipping"
                );
                report.skipped_duplicate += 1;
                continue;
            }

            let new_amount_paid = &tx.amount_paid + &event.amount;
            let new_pending = &tx.total_amount - &new_amount_paid;
            let new_status = if new_amount_paid >= tx.total_amount {
                status::COBRADO.to_string()
            } else if new_amount_paid > BigDecimal::from(0) {
                status::PAGO_PARCIAL.to_string()
            } else {
                // Only reachable for a zero-amount event.
                tx.status.clone()
            };

            if new_amount_paid > tx.total_amount {
                tracing::warn!(
                    transaction_id = %tx_id,
                    amount_paid = %new_amount_paid,
                    total_amount = %tx.total_amount,
                    "transaction overpaid"
                );
            }

            let payment = Payment::from_gateway(
                tx.id,
                tx.client_id,
                event.amount.clone(),
                event.reference.clone(),
            );
            let audit = AuditLogEntry::payment_received(
                payment.id,
                tx.client_id,
                json!({
                    "amount_paid": tx.amount_paid.to_string(),
                    "status": tx.status,
                }),
                json!({
                    "amount_paid": new_amount_paid.to_string(),
                    "status": new_status,
                    "payment_amount": event.amount.to_string(),
                }),
            );

            let mut updated = tx.clone();
            updated.amount_paid = new_amount_paid;
            updated.pending_amount = new_pending;
            updated.status = new_status;
            updated.updated_at = Utc::now();

            self.store
                .commit_settlement(&SettlementWrite {
                    previous: tx,
                    updated,
                    payment,
                    audit,
                })
                .await?;

            report.processed += 1;
        }

        tracing::info!(
            processed = report.processed,
            skipped_missing = report.skipped_missing,
            skipped_duplicate = report.skipped_duplicate,
            "reconciliation completed"
        );

        Ok(report)
    }
}
