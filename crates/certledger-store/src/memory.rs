//! In-memory storage implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use certledger_core::{
    Confirmation, LogId, NewTransactionLog, TransactionId, TransactionLogRecord,
    TransactionStatus, UserId,
};
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::TransactionLogStore;

/// Process-local store keyed by transaction ID.
///
/// The write lock makes check-then-insert atomic, which is all the uniqueness
/// guarantee needs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<TransactionId, TransactionLogRecord>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Overwrite a record's creation time.
    ///
    /// Returns `false` if no record exists for the transaction.
    pub async fn set_created_at(
        &self,
        transaction_id: &TransactionId,
        created_at: DateTime<Utc>,
    ) -> bool {
        match self.records.write().await.get_mut(transaction_id) {
            Some(record) => {
                record.created_at = created_at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl TransactionLogStore for MemoryStore {
    async fn insert(&self, log: NewTransactionLog) -> Result<TransactionLogRecord> {
        let mut records = self.records.write().await;

        if records.contains_key(&log.transaction_id) {
            return Err(StoreError::Duplicate {
                transaction_id: log.transaction_id.to_string(),
            });
        }

        let record = TransactionLogRecord::from_new(log, LogId::generate(), Utc::now());
        records.insert(record.transaction_id, record.clone());
        Ok(record)
    }

    async fn insert_if_absent(&self, log: NewTransactionLog) -> Result<bool> {
        let mut records = self.records.write().await;

        if records.contains_key(&log.transaction_id) {
            return Ok(false);
        }

        let record = TransactionLogRecord::from_new(log, LogId::generate(), Utc::now());
        records.insert(record.transaction_id, record);
        Ok(true)
    }

    async fn get(&self, transaction_id: &TransactionId) -> Result<Option<TransactionLogRecord>> {
        Ok(self.records.read().await.get(transaction_id).cloned())
    }

    async fn confirm(
        &self,
        transaction_id: &TransactionId,
        confirmation: &Confirmation,
    ) -> Result<bool> {
        Ok(self
            .records
            .write()
            .await
            .get_mut(transaction_id)
            .is_some_and(|record| record.apply_confirmation(confirmation)))
    }

    async fn list_stale(
        &self,
        statuses: &[TransactionStatus],
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionLogRecord>> {
        let records = self.records.read().await;

        let mut stale: Vec<_> = records
            .values()
            .filter(|r| {
                statuses.contains(&r.status)
                    && r.created_at < created_before
                    && !r.is_settled_by_mirror()
            })
            .cloned()
            .collect();
        stale.sort_by_key(|r| (r.status != TransactionStatus::Pending, r.created_at));
        stale.truncate(limit);

        Ok(stale)
    }

    async fn list_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionLogRecord>> {
        let records = self.records.read().await;

        let mut owned: Vec<_> = records
            .values()
            .filter(|r| r.user_id == *user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(owned.into_iter().skip(offset).take(limit).collect())
    }
}
