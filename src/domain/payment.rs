//! Payment domain entity. Append-only: created once per settled
//! (event, transaction) pair, never updated or deleted.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Fixed tag identifying how the money arrived.
pub const METHOD_GATEWAY: &str = "gateway";
/// Actor tag for records authored by the automated webhook flow.
pub const CREATED_BY_SYSTEM: &str = "system";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payment {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub client_id: Uuid,
    pub amount: BigDecimal,
    pub method: String,
    pub reference: String,
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn from_gateway(
        transaction_id: Uuid,
        client_id: Uuid,
        amount: BigDecimal,
        reference: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id,
            client_id,
            amount,
            method: METHOD_GATEWAY.to_string(),
            reference,
            notes: Some("payment received via gateway webhook".to_string()),
            created_by: CREATED_BY_SYSTEM.to_string(),
            created_at: Utc::now(),
        }
    }
}
