//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of `TransactionLogStore`.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use certledger_core::{
    Confirmation, LogId, NewTransactionLog, TransactionId, TransactionLogRecord,
    TransactionStatus, UserId,
};
use chrono::{DateTime, Utc};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, Direction, IteratorMode,
    MultiThreaded, Options, WriteBatch,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::TransactionLogStore;

/// RocksDB-backed transaction log.
///
/// Read-modify-write sequences run under a single write lock so that
/// check-then-insert cannot race.
pub struct RocksStore {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
    write_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = DBWithThreadMode::open_cf_descriptors(&opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Mutex::new(()),
        })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| StoreError::Database("write lock poisoned".into()))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn read(&self, transaction_id: &TransactionId) -> Result<Option<TransactionLogRecord>> {
        let cf = self.cf(cf::TRANSACTION_LOGS)?;

        self.db
            .get_cf(&cf, keys::transaction_log_key(transaction_id))
            .map_err(|e| StoreError::Database(e.to_string()))?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Write a new record and its index entry. Caller holds the write lock.
    fn write_new(&self, record: &TransactionLogRecord) -> Result<()> {
        let cf_logs = self.cf(cf::TRANSACTION_LOGS)?;
        let cf_by_user = self.cf(cf::TRANSACTION_LOGS_BY_USER)?;

        let key = keys::transaction_log_key(&record.transaction_id);
        let user_key = keys::user_transaction_log_key(
            &record.user_id,
            record.created_at,
            &record.transaction_id,
        );
        let value = Self::serialize(record)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_logs, &key, &value);
        batch.put_cf(&cf_by_user, &user_key, []);

        self.db
            .write(batch)
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl TransactionLogStore for RocksStore {
    async fn insert(&self, log: NewTransactionLog) -> Result<TransactionLogRecord> {
        let _guard = self.lock()?;

        if self.read(&log.transaction_id)?.is_some() {
            return Err(StoreError::Duplicate {
                transaction_id: log.transaction_id.to_string(),
            });
        }

        let record = TransactionLogRecord::from_new(log, LogId::generate(), Utc::now());
        self.write_new(&record)?;
        Ok(record)
    }

    async fn insert_if_absent(&self, log: NewTransactionLog) -> Result<bool> {
        let _guard = self.lock()?;

        if self.read(&log.transaction_id)?.is_some() {
            return Ok(false);
        }

        let record = TransactionLogRecord::from_new(log, LogId::generate(), Utc::now());
        self.write_new(&record)?;
        Ok(true)
    }

    async fn get(&self, transaction_id: &TransactionId) -> Result<Option<TransactionLogRecord>> {
        self.read(transaction_id)
    }

    async fn confirm(
        &self,
        transaction_id: &TransactionId,
        confirmation: &Confirmation,
    ) -> Result<bool> {
        let _guard = self.lock()?;

        let Some(mut record) = self.read(transaction_id)? else {
            return Ok(false);
        };
        if !record.apply_confirmation(confirmation) {
            return Ok(false);
        }

        let cf = self.cf(cf::TRANSACTION_LOGS)?;
        let value = Self::serialize(&record)?;
        self.db
            .put_cf(&cf, keys::transaction_log_key(transaction_id), value)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(true)
    }

    async fn list_stale(
        &self,
        statuses: &[TransactionStatus],
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionLogRecord>> {
        let cf = self.cf(cf::TRANSACTION_LOGS)?;

        let mut stale = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item.map_err(|e| StoreError::Database(e.to_string()))?;
            let record: TransactionLogRecord = Self::deserialize(&value)?;

            if statuses.contains(&record.status)
                && record.created_at < created_before
                && !record.is_settled_by_mirror()
            {
                stale.push(record);
            }
        }

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
        let cf_by_user = self.cf(cf::TRANSACTION_LOGS_BY_USER)?;
        let prefix = keys::user_transaction_logs_prefix(user_id);

        let iter = self
            .db
            .iterator_cf(&cf_by_user, IteratorMode::From(&prefix, Direction::Forward));

        let mut all_keys: Vec<Vec<u8>> = Vec::new();
        for item in iter {
            let (key, _) = item.map_err(|e| StoreError::Database(e.to_string()))?;

            if !key.starts_with(&prefix) {
                break;
            }

            all_keys.push(key.to_vec());
        }

        // Newest first
        all_keys.reverse();

        let mut records = Vec::new();
        for key in all_keys.into_iter().skip(offset).take(limit) {
            let transaction_id = keys::transaction_id_from_user_key(&key)?;
            if let Some(record) = self.read(&transaction_id)? {
                records.push(record);
            }
        }

        Ok(records)
    }
}
