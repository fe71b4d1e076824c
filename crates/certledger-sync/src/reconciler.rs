//! Mirror-driven reconciliation of the transaction log.

use std::sync::Arc;

use certledger_core::{
    Confirmation, LogMetadata, NewTransactionLog, TransactionId, TransactionLogRecord,
    TransactionType, UserId,
};
use certledger_mirror::{MirrorQuery, MirrorTransaction, RetryPolicy};
use certledger_store::TransactionLogStore;
use chrono::Utc;
use tracing::{debug, error, info, instrument, warn};

/// Consensus details copied from a mirror record into log metadata.
pub(crate) fn consensus_metadata(transaction: &MirrorTransaction) -> LogMetadata {
    LogMetadata {
        consensus_timestamp: Some(transaction.consensus_timestamp.clone()),
        charged_tx_fee: transaction.charged_tx_fee,
        ..LogMetadata::default()
    }
}

/// What re-driving one existing record achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// The record reached its terminal state, in this pass or a concurrent one.
    Synced,
    /// The record was terminal before this pass. Nothing changed.
    AlreadyTerminal,
    /// The mirror could not account for the transaction, or the update failed.
    Unresolved,
}

/// Derives durable log state from the mirror.
///
/// Every outcome is reported as a boolean; bookkeeping failures never escape.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn TransactionLogStore>,
    mirror: Arc<dyn MirrorQuery>,
    policy: RetryPolicy,
}

impl Reconciler {
    /// Create a reconciler with the reconciliation polling budget (15 x 2s).
    #[must_use]
    pub fn new(store: Arc<dyn TransactionLogStore>, mirror: Arc<dyn MirrorQuery>) -> Self {
        Self {
            store,
            mirror,
            policy: RetryPolicy::reconciliation(),
        }
    }

    /// Override the polling budget.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Polling budget in use.
    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Ensure a record exists for `transaction_id`.
    ///
    /// Returns `true` if the record is now durably present, including when it
    /// already was. `metadata` is the submission-time metadata (source, signer)
    /// to carry into a newly created record.
    #[instrument(
        skip(self, metadata),
        fields(transaction_id = %transaction_id, transaction_type = %transaction_type)
    )]
    pub async fn sync(
        &self,
        transaction_id: &TransactionId,
        user_id: UserId,
        transaction_type: &TransactionType,
        metadata: LogMetadata,
    ) -> bool {
        match self.store.exists(transaction_id).await {
            Ok(true) => {
                debug!("Transaction already logged");
                return true;
            }
            Ok(false) => {}
            Err(e) => {
                // The insert below is still guarded by the uniqueness constraint.
                warn!(error = %e, "Existence check failed, continuing with mirror lookup");
            }
        }

        let Some(transaction) = self
            .mirror
            .wait_for_transaction(transaction_id, self.policy)
            .await
        else {
            warn!(
                max_retries = self.policy.max_retries,
                "Transaction not found on mirror, reconciliation deferred"
            );
            return false;
        };

        let mut record_metadata = metadata;
        record_metadata.merge(consensus_metadata(&transaction));
        record_metadata.merge(LogMetadata {
            synced_from_mirror: Some(true),
            synced_at: Some(Utc::now()),
            ..LogMetadata::default()
        });

        let log = NewTransactionLog {
            transaction_id: *transaction_id,
            user_id,
            transaction_type: transaction_type.clone(),
            status: transaction.status(),
            transaction_hash: transaction.transaction_hash.clone(),
            metadata: record_metadata,
        };

        match self.store.insert_if_absent(log).await {
            Ok(true) => {
                info!(status = %transaction.status(), "Transaction log recovered from mirror");
                true
            }
            Ok(false) => {
                debug!("Transaction logged concurrently");
                true
            }
            Err(e) => {
                error!(error = %e, "Failed to write reconciled transaction log");
                false
            }
        }
    }

    /// Re-drive an existing record toward its terminal state.
    ///
    /// Pending records are updated in place from the mirror. A record that was
    /// already terminal is never rewritten.
    #[instrument(
        skip(self, record),
        fields(transaction_id = %record.transaction_id, status = %record.status)
    )]
    pub async fn reconcile_record(&self, record: &TransactionLogRecord) -> RecordOutcome {
        let Some(transaction) = self
            .mirror
            .wait_for_transaction(&record.transaction_id, self.policy)
            .await
        else {
            warn!("Transaction still not on mirror");
            return RecordOutcome::Unresolved;
        };

        let mut metadata = consensus_metadata(&transaction);
        metadata.synced_from_mirror = Some(true);
        metadata.synced_at = Some(Utc::now());

        let confirmation = Confirmation {
            status: transaction.status(),
            transaction_hash: transaction.transaction_hash.clone(),
            metadata,
        };

        match self.store.confirm(&record.transaction_id, &confirmation).await {
            Ok(true) => {
                info!(new_status = %confirmation.status, "Transaction log reconciled");
                RecordOutcome::Synced
            }
            Ok(false) if record.status.is_terminal() => {
                if record.status != confirmation.status {
                    warn!(
                        mirror_status = %confirmation.status,
                        "Stored terminal status disagrees with mirror"
                    );
                }
                RecordOutcome::AlreadyTerminal
            }
            Ok(false) => {
                debug!("Transaction log confirmed concurrently");
                RecordOutcome::Synced
            }
            Err(e) => {
                error!(error = %e, "Failed to update transaction log from mirror");
                RecordOutcome::Unresolved
            }
        }
    }
}
