//! Ledger mirror client.
//!
//! The mirror is an eventually consistent read replica of ledger history. This crate
//! queries it for transaction status, topic messages and account history, and probes
//! its health.
//!
//! # Example
//!
//! ```no_run
//! use certledger_core::{Network, TransactionId};
//! use certledger_mirror::{MirrorClient, MirrorQuery, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mirror = MirrorClient::new(Network::Testnet)?;
//! let id: TransactionId = "0.0.1001@1700000000.123456789".parse()?;
//!
//! // Poll every 2s, up to 10 times.
//! if let Some(tx) = mirror.wait_for_transaction(&id, RetryPolicy::default()).await {
//!     println!("{} reached consensus at {}", id, tx.consensus_timestamp);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

mod client;
mod error;
mod query;
mod types;

pub use client::{MirrorClient, MirrorOptions};
pub use error::MirrorError;
pub use query::{MirrorQuery, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use types::*;
