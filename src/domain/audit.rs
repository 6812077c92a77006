//! Audit trail entity. One entry per settled transaction, immutable
//! thereafter; a forensic record the engine writes but never reads back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

pub const ACTION_PAYMENT_RECEIVED: &str = "payment_received";
pub const ENTITY_PAYMENT: &str = "payment";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub action: String,
    pub entity_type: String,
    /// Id of the Payment this entry documents.
    pub entity_id: Uuid,
    pub client_id: Uuid,
    /// Snapshot of `{amount_paid, status}` before the mutation.
    pub previous_value: Value,
    /// Snapshot of `{amount_paid, status, payment_amount}` after it.
    pub new_value: Value,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn payment_received(
        payment_id: Uuid,
        client_id: Uuid,
        previous_value: Value,
        new_value: Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: ACTION_PAYMENT_RECEIVED.to_string(),
            entity_type: ENTITY_PAYMENT.to_string(),
            entity_id: payment_id,
            client_id,
            previous_value,
            new_value,
            performed_by: super::payment::CREATED_BY_SYSTEM.to_string(),
            timestamp: Utc::now(),
        }
    }
}
