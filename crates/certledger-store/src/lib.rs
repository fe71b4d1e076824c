//! Transaction log storage for certledger.
//!
//! This crate persists [`TransactionLogRecord`]s, the local index of ledger
//! transactions. Three backends implement [`TransactionLogStore`]:
//!
//! - [`PgStore`]: PostgreSQL via `sqlx`, the production backend. The
//!   `transaction_logs` table carries a `UNIQUE` constraint on `transaction_id`.
//! - [`MemoryStore`]: process-local, for tests and single-node development.
//! - `RocksStore`: embedded `RocksDB` (feature `rocksdb-backend`).
//!
//! # Uniqueness
//!
//! At most one record exists per `TransactionId`. Every backend enforces this at
//! write time, so callers may treat an existence check as an optimization only.
//!
//! # Example
//!
//! ```no_run
//! use certledger_core::{LogMetadata, NewTransactionLog, TransactionType, UserId};
//! use certledger_store::{MemoryStore, TransactionLogStore};
//!
//! # async fn example() -> certledger_store::Result<()> {
//! let store = MemoryStore::new();
//! let id = "0.0.1001@1700000000.123456789".parse().unwrap();
//!
//! let log = NewTransactionLog::pending(
//!     id,
//!     UserId::generate(),
//!     TransactionType::TokenMint,
//!     LogMetadata::default(),
//! );
//! store.insert(log).await?;
//! assert!(store.exists(&id).await?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod postgres;

#[cfg(feature = "rocksdb-backend")]
pub mod keys;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::RocksStore;

use async_trait::async_trait;
use certledger_core::{
    Confirmation, NewTransactionLog, TransactionId, TransactionLogRecord, TransactionStatus,
    UserId,
};
use chrono::{DateTime, Utc};

/// The storage trait for the transaction log.
///
/// This trait abstracts the storage layer, allowing for different implementations
/// (e.g., PostgreSQL, in-memory for testing).
#[async_trait]
pub trait TransactionLogStore: Send + Sync {
    /// Insert a new record.
    ///
    /// # Errors
    ///
    /// - `StoreError::Duplicate` if a record already exists for the transaction.
    /// - `StoreError::Database` if the datastore is unavailable.
    async fn insert(&self, log: NewTransactionLog) -> Result<TransactionLogRecord>;

    /// Insert a record unless one already exists for the transaction.
    ///
    /// Returns `false` when another writer got there first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn insert_if_absent(&self, log: NewTransactionLog) -> Result<bool>;

    /// Get a record by transaction ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn get(&self, transaction_id: &TransactionId) -> Result<Option<TransactionLogRecord>>;

    /// Get a record that must exist.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if there is no record for the transaction.
    async fn require(&self, transaction_id: &TransactionId) -> Result<TransactionLogRecord> {
        self.get(transaction_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                transaction_id: transaction_id.to_string(),
            })
    }

    /// Check whether a record exists for the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn exists(&self, transaction_id: &TransactionId) -> Result<bool> {
        Ok(self.get(transaction_id).await?.is_some())
    }

    /// Move a pending record to a terminal state.
    ///
    /// Sets the hash when the confirmation carries one and merges the confirmation
    /// metadata into the stored metadata. Records that are not `pending` are left
    /// untouched. Returns whether a row changed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn confirm(
        &self,
        transaction_id: &TransactionId,
        confirmation: &Confirmation,
    ) -> Result<bool>;

    /// List records in one of `statuses` created before `created_before`.
    ///
    /// Records already settled by the mirror are excluded. Pending records come
    /// first, then the rest; each group oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_stale(
        &self,
        statuses: &[TransactionStatus],
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionLogRecord>>;

    /// List a user's records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    async fn list_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionLogRecord>>;
}
