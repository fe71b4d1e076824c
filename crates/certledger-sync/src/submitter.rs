//! Ledger operation execution boundary.
//!
//! Ledger operations are not idempotent under blind retry (re-submitting a mint
//! can double-mint), so nothing here retries.

use std::future::Future;

use certledger_core::{TransactionId, TransactionType};

/// Why a ledger operation did not produce a transaction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmissionError {
    /// Rejected before reaching consensus (bad signature, insufficient balance, ...).
    #[error("precheck failed: {0}")]
    Precheck(String),

    /// Reached consensus with a non-success receipt.
    #[error("transaction failed with receipt status {status}")]
    Receipt {
        /// Receipt status code.
        status: String,
    },

    /// The ledger network could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The operation did not complete in time.
    #[error("submission timed out")]
    Timeout,

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl SubmissionError {
    /// Short machine-readable classification.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Precheck(_) => "precheck",
            Self::Receipt { .. } => "receipt",
            Self::Network(_) => "network",
            Self::Timeout => "timeout",
            Self::Other(_) => "other",
        }
    }
}

/// A single ledger-mutating operation.
///
/// Token creation, minting, topic creation, message submission and token
/// association all reduce to this: do the work once, return the transaction ID.
/// Any `FnOnce() -> impl Future<Output = Result<TransactionId, SubmissionError>>`
/// is an operation.
pub trait LedgerOperation: Send {
    /// Execute the operation.
    fn submit(self) -> impl Future<Output = Result<TransactionId, SubmissionError>> + Send;
}

impl<F, Fut> LedgerOperation for F
where
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<TransactionId, SubmissionError>> + Send,
{
    fn submit(self) -> impl Future<Output = Result<TransactionId, SubmissionError>> + Send {
        self()
    }
}

/// Runs ledger operations and logs their outcome uniformly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionSubmitter;

impl TransactionSubmitter {
    /// Execute `operation` once.
    ///
    /// # Errors
    ///
    /// Propagates the operation's error unchanged.
    pub async fn submit<O: LedgerOperation>(
        &self,
        transaction_type: &TransactionType,
        operation: O,
    ) -> Result<TransactionId, SubmissionError> {
        match operation.submit().await {
            Ok(transaction_id) => {
                tracing::debug!(
                    transaction_id = %transaction_id,
                    transaction_type = %transaction_type,
                    "Ledger operation submitted"
                );
                Ok(transaction_id)
            }
            Err(e) => {
                tracing::warn!(
                    transaction_type = %transaction_type,
                    kind = e.kind(),
                    error = %e,
                    "Ledger operation failed"
                );
                Err(e)
            }
        }
    }
}
