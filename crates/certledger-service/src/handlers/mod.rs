//! API handlers.

pub mod health;
pub mod recovery;
pub mod topics;
pub mod transactions;
