//! Certledger HTTP service.
//!
//! Operational surface over the transaction log:
//!
//! - Health, including a probe of the ledger mirror
//! - Per-user transaction log lookup
//! - On-demand and scheduled recovery of stale records
//! - Advisory topic message lookup
//!
//! # Authentication
//!
//! 1. **User JWTs** (HS256, `sub` = user id) - for end-user lookups
//! 2. **Service API keys** (`x-api-key`) - for recovery and topic endpoints

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use config::{ServiceConfig, StoreBackend};
pub use error::ApiError;
pub use routes::create_router;
pub use scheduler::{SweepRun, SweepRunner, SweepScheduler, SweepStatus};
pub use state::AppState;
