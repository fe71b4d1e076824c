//! Batch recovery of stale transaction log records.

use std::sync::Arc;
use std::time::Duration;

use certledger_core::TransactionStatus;
use certledger_store::TransactionLogStore;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::reconciler::{RecordOutcome, Reconciler};

/// Statuses the sweep re-drives.
pub const SWEEPABLE_STATUSES: [TransactionStatus; 2] =
    [TransactionStatus::Pending, TransactionStatus::Failed];

/// Sweep tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOptions {
    /// Records younger than this are left to the asynchronous confirmation.
    pub min_age: Duration,
    /// Records reconciled at once.
    pub concurrency: usize,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            min_age: Duration::from_secs(5 * 60),
            concurrency: 4,
        }
    }
}

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Records confirmed against the mirror.
    pub synced: usize,
    /// Records the mirror still could not account for.
    pub failed: usize,
    /// Records that were already terminal. Left as they were.
    pub skipped: usize,
}

/// Re-drives stale `pending` and `failed` records through the reconciler.
#[derive(Clone)]
pub struct RecoverySweep {
    store: Arc<dyn TransactionLogStore>,
    reconciler: Reconciler,
    options: SweepOptions,
}

impl RecoverySweep {
    /// Create a sweep with default options.
    #[must_use]
    pub fn new(store: Arc<dyn TransactionLogStore>, reconciler: Reconciler) -> Self {
        Self {
            store,
            reconciler,
            options: SweepOptions::default(),
        }
    }

    /// Override the sweep options.
    #[must_use]
    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }

    /// Reconcile up to `limit` stale records, oldest first.
    ///
    /// Never fails: individual failures are counted and the sweep moves on.
    #[instrument(skip(self))]
    pub async fn retry_failed_transactions(&self, limit: usize) -> SweepReport {
        let min_age = chrono::Duration::from_std(self.options.min_age)
            .unwrap_or_else(|_| chrono::Duration::minutes(5));
        let cutoff = Utc::now() - min_age;

        let records = match self
            .store
            .list_stale(&SWEEPABLE_STATUSES, cutoff, limit)
            .await
        {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to list stale transactions");
                return SweepReport::default();
            }
        };

        if records.is_empty() {
            return SweepReport::default();
        }

        info!(count = records.len(), "Sweeping stale transactions");

        let outcomes: Vec<RecordOutcome> = stream::iter(records.into_iter().map(|record| {
            let reconciler = self.reconciler.clone();
            async move { reconciler.reconcile_record(&record).await }
        }))
        .buffer_unordered(self.options.concurrency.max(1))
        .collect()
        .await;

        let mut report = SweepReport::default();
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Synced => report.synced += 1,
                RecordOutcome::AlreadyTerminal => report.skipped += 1,
                RecordOutcome::Unresolved => report.failed += 1,
            }
        }

        info!(
            synced = report.synced,
            failed = report.failed,
            skipped = report.skipped,
            "Recovery sweep finished"
        );
        report
    }
}
