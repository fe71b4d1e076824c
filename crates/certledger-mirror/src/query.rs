//! The mirror query seam and its fixed-interval polling loop.

use std::time::Duration;

use async_trait::async_trait;
use certledger_core::{Network, TransactionId};

use crate::error::MirrorError;
use crate::types::{MirrorHealth, MirrorTransaction};

/// Default number of `get_transaction` attempts in [`MirrorQuery::wait_for_transaction`].
pub const DEFAULT_MAX_RETRIES: u32 = 10;

/// Default delay between polling attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(2000);

/// Bounded, fixed-interval polling policy.
///
/// Mirror propagation lag is roughly constant, so the delay does not grow
/// between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts.
    pub max_retries: u32,
    /// Pause between consecutive attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Create a policy.
    #[must_use]
    pub const fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
        }
    }

    /// Budget for the recovery path (15 x 2s). Nobody waits on it synchronously.
    #[must_use]
    pub const fn reconciliation() -> Self {
        Self::new(15, DEFAULT_RETRY_DELAY)
    }

    /// Budget for the post-submission confirmation pass (5 x 2s).
    #[must_use]
    pub const fn confirmation() -> Self {
        Self::new(5, DEFAULT_RETRY_DELAY)
    }

    /// Upper bound on the time spent sleeping under this policy.
    #[must_use]
    pub fn total_delay(&self) -> Duration {
        self.retry_delay * self.max_retries.saturating_sub(1)
    }
}

/// Read access to the ledger mirror.
///
/// Implemented by [`MirrorClient`](crate::MirrorClient); tests substitute scripted fakes.
#[async_trait]
pub trait MirrorQuery: Send + Sync {
    /// Network this mirror serves.
    fn network(&self) -> Network;

    /// Fetch one transaction.
    ///
    /// Returns `Ok(None)` while the transaction is not yet visible, including when the
    /// request times out or the connection fails.
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected HTTP statuses.
    async fn get_transaction(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<Option<MirrorTransaction>, MirrorError>;

    /// Probe mirror availability and latency.
    async fn check_health(&self) -> MirrorHealth;

    /// Poll [`get_transaction`](Self::get_transaction) until the record appears or the
    /// policy is exhausted. Errors are absorbed into the retry loop.
    async fn wait_for_transaction(
        &self,
        transaction_id: &TransactionId,
        policy: RetryPolicy,
    ) -> Option<MirrorTransaction> {
        for attempt in 1..=policy.max_retries {
            match self.get_transaction(transaction_id).await {
                Ok(Some(transaction)) => {
                    tracing::debug!(
                        transaction_id = %transaction_id,
                        attempt,
                        result = %transaction.result,
                        "Transaction visible on mirror"
                    );
                    return Some(transaction);
                }
                Ok(None) => {
                    tracing::debug!(
                        transaction_id = %transaction_id,
                        attempt,
                        max_retries = policy.max_retries,
                        "Transaction not yet on mirror"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        transaction_id = %transaction_id,
                        attempt,
                        error = %e,
                        "Mirror query failed"
                    );
                }
            }

            if attempt < policy.max_retries {
                tokio::time::sleep(policy.retry_delay).await;
            }
        }

        tracing::warn!(
            transaction_id = %transaction_id,
            max_retries = policy.max_retries,
            "Transaction did not appear on mirror"
        );
        None
    }
}
