//! Read-only operational surface over the records the engine touches.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;

use crate::error::AppError;
use crate::AppState;

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let tx = state
        .store
        .get_transaction(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Transaction {} not found", id)))?;

    Ok(Json(tx))
}

pub async fn list_payments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let payments = state.store.payments_for_transaction(id).await?;

    Ok(Json(payments))
}

pub async fn list_audit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let entries = state.store.audit_for_transaction(id).await?;

    Ok(Json(entries))
}
