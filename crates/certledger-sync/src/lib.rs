//! Resilient ledger transaction submission and reconciliation.
//!
//! Every ledger operation the ledger accepts must end up with exactly one local
//! log record, even when the datastore is briefly unavailable. The pieces:
//!
//! - [`TransactionSubmitter`]: runs a [`LedgerOperation`] once, no retries.
//! - [`LocalLogWriter`]: inserts the `pending` record right after submission.
//! - [`Reconciler`]: derives a record from the mirror when the direct write failed.
//! - [`ResilientExecutor`]: composes the above and schedules an asynchronous
//!   confirmation on [`ConfirmationTasks`].
//! - [`RecoverySweep`]: re-drives stale `pending`/`failed` records.
//!
//! # Staleness
//!
//! The confirmation runs detached. A caller reading the log right after
//! `execute` returns may still observe `pending`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use certledger_core::{Network, TransactionId, TransactionType, UserId};
//! use certledger_mirror::MirrorClient;
//! use certledger_store::MemoryStore;
//! use certledger_sync::{ExecuteOptions, ResilientExecutor, SubmissionError};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = ResilientExecutor::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MirrorClient::new(Network::Testnet)?),
//! );
//!
//! let result = executor
//!     .execute(
//!         UserId::generate(),
//!         TransactionType::TokenMint,
//!         || async {
//!             // Call the ledger SDK here.
//!             "0.0.1001@1700000000.123456789"
//!                 .parse::<TransactionId>()
//!                 .map_err(|_| SubmissionError::Other("bad id".into()))
//!         },
//!         ExecuteOptions::default(),
//!     )
//!     .await;
//!
//! assert!(result.success);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod confirmation;
mod executor;
mod log_writer;
mod reconciler;
mod submitter;
mod sweep;

pub use confirmation::ConfirmationTasks;
pub use executor::{
    ExecuteOptions, ExecutionIssue, ResilienceConfig, ResilientExecutor, TransactionResult,
    DEFAULT_MIRROR_BACKUP_DELAY,
};
pub use log_writer::LocalLogWriter;
pub use reconciler::{RecordOutcome, Reconciler};
pub use submitter::{LedgerOperation, SubmissionError, TransactionSubmitter};
pub use sweep::{RecoverySweep, SweepOptions, SweepReport, SWEEPABLE_STATUSES};
