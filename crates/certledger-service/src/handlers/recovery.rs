//! Recovery handlers (service API key auth).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use certledger_core::{LogMetadata, TransactionType, UserId};

use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::handlers::transactions::{parse_transaction_id, TransactionResponse};
use crate::scheduler::SweepStatus;
use crate::state::AppState;

/// Most records a single on-demand sweep may touch.
const MAX_SWEEP_LIMIT: usize = 500;

/// Sweep query parameters.
#[derive(Debug, Deserialize)]
pub struct SweepQuery {
    /// Records to reconcile (default: the configured sweep limit).
    pub limit: Option<usize>,
}

/// Accepted sweep.
#[derive(Debug, Serialize)]
pub struct SweepStarted {
    /// Records the sweep may touch.
    pub limit: usize,
}

/// Start the batch recovery sweep in the background.
///
/// Answers `202 Accepted` at once; `GET /v1/recovery/sweep` reports the result.
/// Only one sweep runs at a time, a second request gets `409 Conflict`.
pub async fn start_sweep(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Query(query): Query<SweepQuery>,
) -> Result<(StatusCode, Json<SweepStarted>), ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.config.sweep_limit)
        .clamp(1, MAX_SWEEP_LIMIT);

    if !state.sweeps.start(limit) {
        return Err(ApiError::Conflict("a recovery sweep is already running".into()));
    }

    tracing::info!(service = %service.service_name, limit, "On-demand recovery sweep started");

    Ok((StatusCode::ACCEPTED, Json(SweepStarted { limit })))
}

/// Whether a sweep is running, and how the last one went.
pub async fn sweep_status(
    State(state): State<Arc<AppState>>,
    _service: ServiceAuth,
) -> Json<SweepStatus> {
    Json(state.sweeps.status())
}

/// Single-transaction reconciliation request.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    /// Owner of the transaction.
    pub user_id: UserId,
    /// Operation kind, e.g. `TOKEN_MINT`.
    pub transaction_type: TransactionType,
}

/// Single-transaction reconciliation response.
#[derive(Debug, Serialize)]
pub struct ReconcileResponse {
    /// Whether a record is now durably present.
    pub synced: bool,
    /// The record, when present.
    pub transaction: Option<TransactionResponse>,
}

/// Make sure one transaction is in the log, deriving it from the mirror if needed.
pub async fn reconcile_transaction(
    State(state): State<Arc<AppState>>,
    service: ServiceAuth,
    Path(transaction_id): Path<String>,
    Json(request): Json<ReconcileRequest>,
) -> Result<Json<ReconcileResponse>, ApiError> {
    let transaction_id = parse_transaction_id(&transaction_id)?;

    tracing::info!(
        service = %service.service_name,
        transaction_id = %transaction_id,
        "On-demand reconciliation"
    );

    let synced = state
        .reconciler()
        .sync(
            &transaction_id,
            request.user_id,
            &request.transaction_type,
            LogMetadata::default(),
        )
        .await;

    let transaction = if synced {
        state
            .store
            .get(&transaction_id)
            .await?
            .as_ref()
            .map(TransactionResponse::from)
    } else {
        None
    };

    Ok(Json(ReconcileResponse {
        synced,
        transaction,
    }))
}
