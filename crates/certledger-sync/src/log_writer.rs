//! Direct write of freshly submitted transactions.

use std::sync::Arc;

use certledger_core::{NewTransactionLog, TransactionLogRecord};
use certledger_store::{StoreError, TransactionLogStore};

/// Inserts the pending record right after a successful submission.
///
/// Failures are returned to the caller, which decides whether to fall back to
/// reconciliation. There is no internal retry.
#[derive(Clone)]
pub struct LocalLogWriter {
    store: Arc<dyn TransactionLogStore>,
}

impl LocalLogWriter {
    /// Create a writer over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn TransactionLogStore>) -> Self {
        Self { store }
    }

    /// Insert exactly one row.
    ///
    /// # Errors
    ///
    /// Returns the store error unchanged, including `StoreError::Duplicate`.
    pub async fn insert(&self, log: NewTransactionLog) -> Result<TransactionLogRecord, StoreError> {
        let transaction_id = log.transaction_id;

        match self.store.insert(log).await {
            Ok(record) => {
                tracing::debug!(
                    transaction_id = %transaction_id,
                    status = %record.status,
                    "Transaction logged"
                );
                Ok(record)
            }
            Err(e) => {
                tracing::warn!(
                    transaction_id = %transaction_id,
                    error = %e,
                    "Direct transaction log write failed"
                );
                Err(e)
            }
        }
    }
}
