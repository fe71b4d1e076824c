//! Core types for certledger.
//!
//! This crate provides the data model shared by the mirror client, the storage
//! backends and the resilient submission layer:
//!
//! - **Identifiers**: `TransactionId`, `AccountId`, `UserId`, `LogId`
//! - **Classification**: `TransactionType`, `TransactionStatus`, `TransactionSource`
//! - **Records**: `TransactionLogRecord`, `NewTransactionLog`, `Confirmation`, `LogMetadata`
//! - **Networks**: `Network` and its public mirror endpoints
//!
//! # Record lifecycle
//!
//! A record is created `pending` right after submission, or directly in a terminal
//! state by reconciliation. It only ever moves from `pending` to `success` or
//! `failed`, and only on the strength of a mirror confirmation.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod network;
pub mod record;
pub mod transaction;

pub use ids::{AccountId, IdError, LogId, TransactionId, UserId};
pub use network::Network;
pub use record::{Confirmation, LogMetadata, NewTransactionLog, TransactionLogRecord};
pub use transaction::{ParseEnumError, TransactionSource, TransactionStatus, TransactionType};
