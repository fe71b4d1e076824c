//! Transaction log records.
//!
//! A `TransactionLogRecord` is the local bookkeeping row for one ledger transaction.
//! Exactly one record exists per `TransactionId`; stores enforce this.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{AccountId, LogId, TransactionId, UserId};
use crate::transaction::{TransactionSource, TransactionStatus, TransactionType};

/// Open metadata attached to a log record.
///
/// Known keys are typed; anything else written by other producers is preserved in
/// `extra` and round-trips untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogMetadata {
    /// When the ledger operation returned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,

    /// Which client path submitted the transaction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<TransactionSource>,

    /// Signing account for wallet-signed submissions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_account_id: Option<AccountId>,

    /// Set by the asynchronous confirmation pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmed_from_mirror: Option<bool>,

    /// Consensus timestamp reported by the mirror (`seconds.nanos`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consensus_timestamp: Option<String>,

    /// Fee charged for the transaction, in the ledger's smallest unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charged_tx_fee: Option<i64>,

    /// Set when the record was written or refreshed by reconciliation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_from_mirror: Option<bool>,

    /// When reconciliation wrote the record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,

    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LogMetadata {
    /// Overlay `patch` onto `self`. Fields absent from the patch are kept.
    pub fn merge(&mut self, patch: LogMetadata) {
        fn overlay<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        overlay(&mut self.executed_at, patch.executed_at);
        overlay(&mut self.source, patch.source);
        overlay(&mut self.signer_account_id, patch.signer_account_id);
        overlay(&mut self.confirmed_from_mirror, patch.confirmed_from_mirror);
        overlay(&mut self.consensus_timestamp, patch.consensus_timestamp);
        overlay(&mut self.charged_tx_fee, patch.charged_tx_fee);
        overlay(&mut self.synced_from_mirror, patch.synced_from_mirror);
        overlay(&mut self.synced_at, patch.synced_at);
        self.extra.extend(patch.extra);
    }

    /// Serialize to a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
    }
}

/// A record to be inserted into the transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransactionLog {
    /// Ledger-assigned natural key.
    pub transaction_id: TransactionId,
    /// Principal who initiated the operation.
    pub user_id: UserId,
    /// What the operation was.
    pub transaction_type: TransactionType,
    /// Initial lifecycle state.
    pub status: TransactionStatus,
    /// Hash, only known once the mirror has seen the transaction.
    pub transaction_hash: Option<String>,
    /// Open metadata.
    pub metadata: LogMetadata,
}

impl NewTransactionLog {
    /// A freshly submitted, unconfirmed record.
    #[must_use]
    pub fn pending(
        transaction_id: TransactionId,
        user_id: UserId,
        transaction_type: TransactionType,
        metadata: LogMetadata,
    ) -> Self {
        Self {
            transaction_id,
            user_id,
            transaction_type,
            status: TransactionStatus::Pending,
            transaction_hash: None,
            metadata,
        }
    }
}

/// A persisted transaction log row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionLogRecord {
    /// Row identifier.
    pub id: LogId,
    /// Ledger-assigned natural key (unique).
    pub transaction_id: TransactionId,
    /// Principal who initiated the operation.
    pub user_id: UserId,
    /// What the operation was.
    pub transaction_type: TransactionType,
    /// Lifecycle state.
    pub status: TransactionStatus,
    /// Hash reported by the mirror.
    pub transaction_hash: Option<String>,
    /// Open metadata.
    pub metadata: LogMetadata,
    /// Assigned by the datastore on insert.
    pub created_at: DateTime<Utc>,
}

impl TransactionLogRecord {
    /// Materialize a new record as a store would on insert.
    #[must_use]
    pub fn from_new(new: NewTransactionLog, id: LogId, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            transaction_id: new.transaction_id,
            user_id: new.user_id,
            transaction_type: new.transaction_type,
            status: new.status,
            transaction_hash: new.transaction_hash,
            metadata: new.metadata,
            created_at,
        }
    }

    /// Terminal, with a status that came from the mirror.
    ///
    /// Such records have nothing left to recover and are skipped by the sweep.
    #[must_use]
    pub fn is_settled_by_mirror(&self) -> bool {
        self.status.is_terminal()
            && (self.metadata.confirmed_from_mirror == Some(true)
                || self.metadata.synced_from_mirror == Some(true))
    }

    /// Apply a mirror confirmation in place.
    ///
    /// Returns `false` and leaves the record untouched unless the record is still
    /// pending and the confirmation carries a terminal status.
    pub fn apply_confirmation(&mut self, confirmation: &Confirmation) -> bool {
        if !self.status.can_transition_to(confirmation.status) {
            return false;
        }

        self.status = confirmation.status;
        if confirmation.transaction_hash.is_some() {
            self.transaction_hash.clone_from(&confirmation.transaction_hash);
        }
        self.metadata.merge(confirmation.metadata.clone());
        true
    }
}

/// Terminal state derived from a mirror record, applied to an existing row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    /// `Success` or `Failed`.
    pub status: TransactionStatus,
    /// Hash reported by the mirror.
    pub transaction_hash: Option<String>,
    /// Metadata keys to overlay (consensus timestamp, fee, provenance flags).
    pub metadata: LogMetadata,
}
