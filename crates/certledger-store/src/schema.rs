//! Column families used by the `RocksDB` backend.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Transaction log records, keyed by canonical transaction ID.
    pub const TRANSACTION_LOGS: &str = "transaction_logs";

    /// Index: records by user, keyed by `user_id || created_at || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTION_LOGS_BY_USER: &str = "transaction_logs_by_user";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![cf::TRANSACTION_LOGS, cf::TRANSACTION_LOGS_BY_USER]
}
