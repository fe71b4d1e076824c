//! Common test utilities for certledger-sync integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use certledger_core::{
    Confirmation, LogMetadata, NewTransactionLog, Network, TransactionId, TransactionLogRecord,
    TransactionStatus, TransactionType, UserId,
};
use certledger_mirror::{MirrorError, MirrorHealth, MirrorQuery, MirrorTransaction};
use certledger_store::{MemoryStore, Result, StoreError, TransactionLogStore};
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// The transaction used throughout the scenarios.
pub fn scenario_tx() -> TransactionId {
    "0.0.1001@1700000000.123456789".parse().unwrap()
}

/// A distinct transaction per `n`.
pub fn tx(n: u32) -> TransactionId {
    TransactionId::new(certledger_core::AccountId::new(0, 0, 2000 + u64::from(n)), 1_700_000_000, n)
        .unwrap()
}

/// A pending record for `id`.
pub fn pending(id: TransactionId, user_id: UserId) -> NewTransactionLog {
    NewTransactionLog::pending(id, user_id, TransactionType::TokenMint, LogMetadata::default())
}

/// One scripted mirror answer.
#[derive(Debug, Clone)]
pub enum Reply {
    /// 404 / not yet propagated.
    Missing,
    /// Unexpected HTTP status.
    Error,
    /// The transaction with this result code.
    Found(&'static str),
}

fn mirror_record(transaction_id: &TransactionId, result: &str) -> MirrorTransaction {
    MirrorTransaction {
        transaction_id: transaction_id.to_mirror_format(),
        consensus_timestamp: "1700000005.000000000".into(),
        transaction_hash: Some("abc123".into()),
        charged_tx_fee: Some(85_000_000),
        result: result.into(),
        name: Some("TOKENMINT".into()),
        transfers: Vec::new(),
    }
}

/// Scripted mirror.
///
/// Answers come from the per-transaction script first, then the shared script,
/// then the fallback.
pub struct FakeMirror {
    script: Mutex<VecDeque<Reply>>,
    per_transaction: Mutex<HashMap<TransactionId, VecDeque<Reply>>>,
    fallback: Reply,
    calls: AtomicUsize,
    call_times: Mutex<Vec<Instant>>,
    healthy: AtomicBool,
}

impl FakeMirror {
    fn with_fallback(fallback: Reply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            per_transaction: Mutex::new(HashMap::new()),
            fallback,
            calls: AtomicUsize::new(0),
            call_times: Mutex::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// The mirror never sees anything.
    pub fn never() -> Self {
        Self::with_fallback(Reply::Missing)
    }

    /// Every transaction is on the mirror with `SUCCESS`.
    pub fn always_success() -> Self {
        Self::with_fallback(Reply::Found("SUCCESS"))
    }

    /// 404 for `misses` calls, then `result`.
    pub fn found_after(misses: usize, result: &'static str) -> Self {
        let mirror = Self::with_fallback(Reply::Found(result));
        mirror
            .script
            .lock()
            .unwrap()
            .extend(std::iter::repeat(Reply::Missing).take(misses));
        mirror
    }

    /// Script answers for one transaction; its last answer repeats.
    pub fn script_for(self, transaction_id: TransactionId, replies: Vec<Reply>) -> Self {
        self.per_transaction
            .lock()
            .unwrap()
            .insert(transaction_id, replies.into());
        self
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.call_times.lock().unwrap().clone()
    }

    fn next_reply(&self, transaction_id: &TransactionId) -> Reply {
        if let Some(replies) = self.per_transaction.lock().unwrap().get_mut(transaction_id) {
            if replies.len() > 1 {
                return replies.pop_front().unwrap_or(Reply::Missing);
            }
            return replies.front().cloned().unwrap_or(Reply::Missing);
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl MirrorQuery for FakeMirror {
    fn network(&self) -> Network {
        Network::Testnet
    }

    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> std::result::Result<Option<MirrorTransaction>, MirrorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.call_times.lock().unwrap().push(Instant::now());

        match self.next_reply(transaction_id) {
            Reply::Missing => Ok(None),
            Reply::Error => Err(MirrorError::Api {
                status: 500,
                body: "internal error".into(),
            }),
            Reply::Found(result) => Ok(Some(mirror_record(transaction_id, result))),
        }
    }

    async fn check_health(&self) -> MirrorHealth {
        if self.healthy.load(Ordering::SeqCst) {
            MirrorHealth {
                mirror_node_available: true,
                mirror_node_latency_ms: Some(12),
            }
        } else {
            MirrorHealth::unavailable()
        }
    }
}

/// Memory store whose writes can be switched off.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_inserts: AtomicBool,
    fail_guarded_inserts: AtomicBool,
    fail_reads: AtomicBool,
    pub guarded_inserts: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Strict inserts (the direct write path) fail.
    pub fn failing_inserts() -> Self {
        let store = Self::new();
        store.fail_inserts.store(true, Ordering::SeqCst);
        store
    }

    /// Every write and read fails.
    pub fn down() -> Self {
        let store = Self::failing_inserts();
        store.fail_guarded_inserts.store(true, Ordering::SeqCst);
        store.fail_reads.store(true, Ordering::SeqCst);
        store
    }

    fn unavailable() -> StoreError {
        StoreError::Database("connection refused".into())
    }

    pub async fn backdate(&self, transaction_id: &TransactionId, created_at: DateTime<Utc>) {
        assert!(self.inner.set_created_at(transaction_id, created_at).await);
    }

    pub async fn record(&self, transaction_id: &TransactionId) -> TransactionLogRecord {
        self.inner.get(transaction_id).await.unwrap().expect("record")
    }
}

#[async_trait]
impl TransactionLogStore for FlakyStore {
    async fn insert(&self, log: NewTransactionLog) -> Result<TransactionLogRecord> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.insert(log).await
    }

    async fn insert_if_absent(&self, log: NewTransactionLog) -> Result<bool> {
        self.guarded_inserts.fetch_add(1, Ordering::SeqCst);
        if self.fail_guarded_inserts.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.insert_if_absent(log).await
    }

    async fn get(&self, transaction_id: &TransactionId) -> Result<Option<TransactionLogRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.get(transaction_id).await
    }

    async fn confirm(
        &self,
        transaction_id: &TransactionId,
        confirmation: &Confirmation,
    ) -> Result<bool> {
        self.inner.confirm(transaction_id, confirmation).await
    }

    async fn list_stale(
        &self,
        statuses: &[TransactionStatus],
        created_before: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<TransactionLogRecord>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable());
        }
        self.inner.list_stale(statuses, created_before, limit).await
    }

    async fn list_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionLogRecord>> {
        self.inner.list_by_user(user_id, limit, offset).await
    }
}

/// Store and mirror as the trait objects the components take.
pub fn wire(
    store: &Arc<FlakyStore>,
    mirror: &Arc<FakeMirror>,
) -> (Arc<dyn TransactionLogStore>, Arc<dyn MirrorQuery>) {
    (
        Arc::clone(store) as Arc<dyn TransactionLogStore>,
        Arc::clone(mirror) as Arc<dyn MirrorQuery>,
    )
}
