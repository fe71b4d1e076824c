//! Error types for transaction log storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Record not found.
    #[error("transaction log not found: {transaction_id}")]
    NotFound {
        /// The transaction ID that was looked up.
        transaction_id: String,
    },

    /// A record already exists for this transaction.
    #[error("duplicate transaction log: {transaction_id}")]
    Duplicate {
        /// The transaction ID that was duplicated.
        transaction_id: String,
    },
}

impl StoreError {
    /// Whether this is a uniqueness conflict on the transaction ID.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }
}
