//! Resilient transaction execution.
//!
//! Submit, then log directly, then fall back to mirror reconciliation, then confirm
//! asynchronously. The result separates the ledger outcome (`success`) from the
//! bookkeeping outcome (`error`, `synced_from_mirror`): a caller is never told an
//! operation failed when the ledger accepted it.

use std::sync::Arc;
use std::time::Duration;

use certledger_core::{
    AccountId, Confirmation, LogMetadata, NewTransactionLog, TransactionId, TransactionSource,
    TransactionType, UserId,
};
use certledger_mirror::{MirrorQuery, RetryPolicy};
use certledger_store::TransactionLogStore;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::confirmation::ConfirmationTasks;
use crate::log_writer::LocalLogWriter;
use crate::reconciler::{consensus_metadata, Reconciler};
use crate::submitter::{LedgerOperation, SubmissionError, TransactionSubmitter};

/// Default wait before the asynchronous confirmation pass starts.
pub const DEFAULT_MIRROR_BACKUP_DELAY: Duration = Duration::from_millis(5000);

/// Per-call execution options.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Fall back to reconciliation when the direct write fails, and confirm
    /// asynchronously when it succeeds.
    pub enable_mirror_backup: bool,
    /// Wait before the asynchronous confirmation pass.
    pub mirror_backup_delay: Duration,
    /// Which client path signs the transaction.
    pub source: TransactionSource,
    /// Signing account for wallet-signed submissions.
    pub signer_account_id: Option<AccountId>,
    /// Extra metadata to store with the record.
    pub metadata: LogMetadata,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            enable_mirror_backup: true,
            mirror_backup_delay: DEFAULT_MIRROR_BACKUP_DELAY,
            source: TransactionSource::Dapp,
            signer_account_id: None,
            metadata: LogMetadata::default(),
        }
    }
}

impl ExecuteOptions {
    /// Options for a transaction signed by the user's wallet.
    #[must_use]
    pub fn wallet(signer_account_id: AccountId) -> Self {
        Self {
            source: TransactionSource::DappWallet,
            signer_account_id: Some(signer_account_id),
            ..Self::default()
        }
    }

    fn record_metadata(&self) -> LogMetadata {
        let mut metadata = self.metadata.clone();
        metadata.executed_at = Some(Utc::now());
        metadata.source = Some(self.source);
        if self.signer_account_id.is_some() {
            metadata.signer_account_id = self.signer_account_id;
        }
        metadata
    }
}

/// Polling budgets for the resilient path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResilienceConfig {
    /// Budget for the fallback reconciliation (default 15 x 2s).
    pub reconciliation: RetryPolicy,
    /// Budget for the asynchronous confirmation (default 5 x 2s).
    pub confirmation: RetryPolicy,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            reconciliation: RetryPolicy::reconciliation(),
            confirmation: RetryPolicy::confirmation(),
        }
    }
}

/// Problem attached to a [`TransactionResult`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecutionIssue {
    /// The ledger operation failed. Nothing was logged.
    #[error("submission failed: {0}")]
    Submission(SubmissionError),

    /// The ledger accepted the operation but no log record could be written.
    #[error("executed but logging failed")]
    LoggingFailed,
}

impl ExecutionIssue {
    /// Whether the ledger operation itself failed.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Submission(_))
    }
}

/// Outcome of [`ResilientExecutor::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionResult {
    /// Whether the ledger accepted the operation.
    pub success: bool,
    /// Set whenever the ledger returned an ID.
    pub transaction_id: Option<TransactionId>,
    /// Fatal when `success` is false, informational otherwise.
    pub error: Option<ExecutionIssue>,
    /// The record was written by fallback reconciliation.
    pub synced_from_mirror: bool,
}

impl TransactionResult {
    fn submission_failed(error: SubmissionError) -> Self {
        Self {
            success: false,
            transaction_id: None,
            error: Some(ExecutionIssue::Submission(error)),
            synced_from_mirror: false,
        }
    }

    fn executed(transaction_id: TransactionId, synced_from_mirror: bool) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            error: None,
            synced_from_mirror,
        }
    }

    fn logging_failed(transaction_id: TransactionId) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            error: Some(ExecutionIssue::LoggingFailed),
            synced_from_mirror: false,
        }
    }

    /// Whether a log record is known to exist.
    #[must_use]
    pub fn is_logged(&self) -> bool {
        self.success && self.error.is_none()
    }
}

/// Composes submission, direct logging, reconciliation and confirmation.
pub struct ResilientExecutor {
    submitter: TransactionSubmitter,
    writer: LocalLogWriter,
    reconciler: Reconciler,
    store: Arc<dyn TransactionLogStore>,
    mirror: Arc<dyn MirrorQuery>,
    confirmations: Arc<ConfirmationTasks>,
    confirmation_policy: RetryPolicy,
}

impl ResilientExecutor {
    /// Create an executor with default budgets and its own confirmation set.
    #[must_use]
    pub fn new(store: Arc<dyn TransactionLogStore>, mirror: Arc<dyn MirrorQuery>) -> Self {
        Self::with_config(
            store,
            mirror,
            ResilienceConfig::default(),
            Arc::new(ConfirmationTasks::new()),
        )
    }

    /// Create an executor with explicit budgets and a shared confirmation set.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn TransactionLogStore>,
        mirror: Arc<dyn MirrorQuery>,
        config: ResilienceConfig,
        confirmations: Arc<ConfirmationTasks>,
    ) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&store), Arc::clone(&mirror))
            .with_policy(config.reconciliation);

        Self {
            submitter: TransactionSubmitter,
            writer: LocalLogWriter::new(Arc::clone(&store)),
            reconciler,
            store,
            mirror,
            confirmations,
            confirmation_policy: config.confirmation,
        }
    }

    /// The reconciler used for fallback.
    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    /// Outstanding asynchronous confirmations.
    #[must_use]
    pub fn confirmations(&self) -> &Arc<ConfirmationTasks> {
        &self.confirmations
    }

    /// Execute a ledger operation and make sure it ends up in the transaction log.
    #[instrument(
        skip(self, operation, options),
        fields(user_id = %user_id, transaction_type = %transaction_type)
    )]
    pub async fn execute<O: LedgerOperation>(
        &self,
        user_id: UserId,
        transaction_type: TransactionType,
        operation: O,
        options: ExecuteOptions,
    ) -> TransactionResult {
        let transaction_id = match self.submitter.submit(&transaction_type, operation).await {
            Ok(transaction_id) => transaction_id,
            Err(e) => return TransactionResult::submission_failed(e),
        };

        let metadata = options.record_metadata();
        let log = NewTransactionLog::pending(
            transaction_id,
            user_id,
            transaction_type.clone(),
            metadata.clone(),
        );

        if self.writer.insert(log).await.is_ok() {
            if options.enable_mirror_backup {
                self.schedule_confirmation(transaction_id, options.mirror_backup_delay);
            }
            return TransactionResult::executed(transaction_id, false);
        }

        if !options.enable_mirror_backup {
            warn!(
                transaction_id = %transaction_id,
                "Transaction executed but not logged, mirror backup disabled"
            );
            return TransactionResult::logging_failed(transaction_id);
        }

        info!(transaction_id = %transaction_id, "Falling back to mirror reconciliation");
        if self
            .reconciler
            .sync(&transaction_id, user_id, &transaction_type, metadata)
            .await
        {
            TransactionResult::executed(transaction_id, true)
        } else {
            warn!(
                transaction_id = %transaction_id,
                "Transaction executed but logging failed; recovery sweep will retry"
            );
            TransactionResult::logging_failed(transaction_id)
        }
    }

    fn schedule_confirmation(&self, transaction_id: TransactionId, delay: Duration) {
        let store = Arc::clone(&self.store);
        let mirror = Arc::clone(&self.mirror);
        let policy = self.confirmation_policy;

        let scheduled = self.confirmations.schedule(delay, async move {
            confirm_from_mirror(store.as_ref(), mirror.as_ref(), transaction_id, policy).await;
        });

        if !scheduled {
            debug!(transaction_id = %transaction_id, "Confirmation skipped");
        }
    }
}

/// Asynchronous confirmation pass: update the pending row from the mirror.
async fn confirm_from_mirror(
    store: &dyn TransactionLogStore,
    mirror: &dyn MirrorQuery,
    transaction_id: TransactionId,
    policy: RetryPolicy,
) {
    let Some(transaction) = mirror.wait_for_transaction(&transaction_id, policy).await else {
        debug!(
            transaction_id = %transaction_id,
            "Not confirmed yet, left pending for the recovery sweep"
        );
        return;
    };

    let mut metadata = consensus_metadata(&transaction);
    metadata.confirmed_from_mirror = Some(true);

    let confirmation = Confirmation {
        status: transaction.status(),
        transaction_hash: transaction.transaction_hash.clone(),
        metadata,
    };

    match store.confirm(&transaction_id, &confirmation).await {
        Ok(true) => info!(
            transaction_id = %transaction_id,
            status = %confirmation.status,
            "Transaction confirmed from mirror"
        ),
        Ok(false) => debug!(transaction_id = %transaction_id, "Transaction already terminal"),
        Err(e) => warn!(
            transaction_id = %transaction_id,
            error = %e,
            "Failed to record mirror confirmation"
        ),
    }
}
