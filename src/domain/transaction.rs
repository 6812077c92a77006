//! Transaction domain entity.
//! Framework-agnostic representation of a receivable owed by a client.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Lifecycle states this engine produces. The wider application owns further
/// states (cancellations etc.), so `status` stays a plain string and unknown
/// values pass through untouched.
pub mod status {
    pub const PENDIENTE: &str = "pendiente";
    pub const PAGO_PARCIAL: &str = "pago_parcial";
    pub const COBRADO: &str = "cobrado";
}

/// A client receivable tracked via total/paid/pending amounts.
///
/// Invariant: `pending_amount == total_amount - amount_paid` after every
/// engine-driven update. `amount_paid` only ever grows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub id: Uuid,
    pub client_id: Uuid,
    pub total_amount: BigDecimal,
    pub amount_paid: BigDecimal,
    pub pending_amount: BigDecimal,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(client_id: Uuid, total_amount: BigDecimal) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            client_id,
            pending_amount: total_amount.clone(),
            total_amount,
            amount_paid: BigDecimal::from(0),
            status: status::PENDIENTE.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}
