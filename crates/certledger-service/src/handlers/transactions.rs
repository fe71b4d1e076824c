//! Transaction log lookup handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use certledger_core::{LogMetadata, TransactionId, TransactionLogRecord};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of records to return (default: 50, max: 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// One transaction log record.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Row ID.
    pub id: String,
    /// Ledger transaction ID.
    pub transaction_id: String,
    /// Operation kind.
    pub transaction_type: String,
    /// `pending`, `success` or `failed`.
    pub status: String,
    /// Hash reported by the mirror.
    pub transaction_hash: Option<String>,
    /// Record metadata.
    pub metadata: LogMetadata,
    /// Timestamp.
    pub created_at: String,
}

impl From<&TransactionLogRecord> for TransactionResponse {
    fn from(record: &TransactionLogRecord) -> Self {
        Self {
            id: record.id.to_string(),
            transaction_id: record.transaction_id.to_string(),
            transaction_type: record.transaction_type.to_string(),
            status: record.status.to_string(),
            transaction_hash: record.transaction_hash.clone(),
            metadata: record.metadata.clone(),
            created_at: record.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Records (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more records.
    pub has_more: bool,
}

/// List the caller's transaction log.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.clamp(1, 100);
    let records = state
        .store
        .list_by_user(&auth.user_id, limit + 1, query.offset)
        .await?;

    let has_more = records.len() > limit;
    let transactions = records
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Get one of the caller's transaction log records.
///
/// Records owned by other users are reported as missing.
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(transaction_id): Path<String>,
) -> Result<Json<TransactionResponse>, ApiError> {
    let transaction_id = parse_transaction_id(&transaction_id)?;

    let record = state
        .store
        .get(&transaction_id)
        .await?
        .filter(|record| record.user_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound(format!("transaction not found: {transaction_id}")))?;

    Ok(Json(TransactionResponse::from(&record)))
}

/// Parse a transaction ID in either the SDK or the mirror format.
pub(crate) fn parse_transaction_id(raw: &str) -> Result<TransactionId, ApiError> {
    raw.parse::<TransactionId>()
        .or_else(|_| TransactionId::from_mirror_format(raw))
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}
