//! Gateway webhook endpoint.
//!
//! The gateway posts a confirmation after deciding a payment's outcome.
//! The raw body is HMAC-verified before parsing; the parsed event is then
//! handed to the reconciliation engine.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use bigdecimal::BigDecimal;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::{PaymentEvent, ReconciliationEngine};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-gateway-signature";

/// Wire shape of the confirmation. Some gateway configurations post the
/// fields at the top level, others nest them under `data`; both are
/// accepted. Every field is optional on the wire, hence the coercion in
/// [`CallbackPayload::into_event`].
#[derive(Debug, Default, Deserialize)]
pub struct CallbackPayload {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default, rename = "transactionIds")]
    pub transaction_ids: Option<Vec<String>>,
    #[serde(default)]
    pub data: Option<Box<CallbackPayload>>,
}

impl CallbackPayload {
    pub fn into_event(self) -> PaymentEvent {
        // Fall back to the nested shape only when the flat one is absent.
        let payload = if self.status.is_none() {
            self.data.map(|d| *d).unwrap_or_default()
        } else {
            self
        };

        let transaction_ids = payload
            .transaction_ids
            .unwrap_or_default()
            .into_iter()
            .filter_map(|raw| match Uuid::parse_str(&raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    tracing::warn!(id = %raw, "unparseable transaction id in callback, dropping");
                    None
                }
            })
            .collect();

        PaymentEvent {
            status: payload.status.unwrap_or_default(),
            amount: coerce_amount(payload.amount.as_ref()),
            reference: payload.reference.unwrap_or_default(),
            transaction_ids,
        }
    }
}

/// Gateway amounts arrive as a JSON number or a numeric string; anything
/// malformed or missing coerces to zero rather than failing the event.
fn coerce_amount(raw: Option<&serde_json::Value>) -> BigDecimal {
    let parsed = match raw {
        Some(serde_json::Value::Number(n)) => n.to_string().parse().ok(),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.unwrap_or_else(|| BigDecimal::from(0))
}

fn verify_signature(secret: &str, headers: &HeaderMap, body: &[u8]) -> Result<(), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing gateway signature".to_string()))?;

    let claimed = hex::decode(signature)
        .map_err(|_| AppError::Unauthorized("malformed gateway signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Internal("webhook secret is unusable".to_string()))?;
    mac.update(body);
    mac.verify_slice(&claimed)
        .map_err(|_| AppError::Unauthorized("invalid gateway signature".to_string()))?;

    Ok(())
}

pub async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    verify_signature(&state.config.gateway_webhook_secret, &headers, &body)?;

    let payload: CallbackPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid callback body: {e}")))?;
    let event = payload.into_event();

    let engine = ReconciliationEngine::new(state.store.clone());
    let report = engine.reconcile(&event).await.map_err(|e| {
        tracing::error!(error = %e, "reconciliation failed");
        // Generic error back to the gateway so it retries delivery; the
        // reference dedup makes the retry safe.
        AppError::Internal("payment processing failed".to_string())
    })?;

    Ok((StatusCode::OK, Json(report)))
}
