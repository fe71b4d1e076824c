//! Key encoding for the `RocksDB` backend.

use certledger_core::{TransactionId, UserId};
use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};

/// Bytes taken by the user and timestamp prefix of an index key.
const USER_INDEX_PREFIX_LEN: usize = 16 + 8;

/// Create a record key from a transaction ID.
#[must_use]
pub fn transaction_log_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_string().into_bytes()
}

/// Create a user index key.
///
/// Format: `user_id (16 bytes) || created_at millis (8 bytes, big-endian) || transaction_id`
///
/// Keys for one user therefore sort by creation time.
#[must_use]
pub fn user_transaction_log_key(
    user_id: &UserId,
    created_at: DateTime<Utc>,
    transaction_id: &TransactionId,
) -> Vec<u8> {
    let millis = u64::try_from(created_at.timestamp_millis()).unwrap_or(0);
    let id = transaction_id.to_string();

    let mut key = Vec::with_capacity(USER_INDEX_PREFIX_LEN + id.len());
    key.extend_from_slice(user_id.as_uuid().as_bytes());
    key.extend_from_slice(&millis.to_be_bytes());
    key.extend_from_slice(id.as_bytes());
    key
}

/// Create a prefix for iterating all records of a user.
#[must_use]
pub fn user_transaction_logs_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_uuid().as_bytes().to_vec()
}

/// Extract the transaction ID from a user index key.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key is truncated or the ID is malformed.
pub fn transaction_id_from_user_key(key: &[u8]) -> Result<TransactionId> {
    let raw = key
        .get(USER_INDEX_PREFIX_LEN..)
        .ok_or_else(|| StoreError::Serialization("user index key too short".into()))?;

    std::str::from_utf8(raw)
        .map_err(|e| StoreError::Serialization(e.to_string()))?
        .parse()
        .map_err(|e: certledger_core::IdError| StoreError::Serialization(e.to_string()))
}
