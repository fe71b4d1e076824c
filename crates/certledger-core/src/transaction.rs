//! Transaction classification types.
//!
//! These enums are persisted as plain strings in the `transaction_logs` table, so each
//! one has a stable `as_str` form and a matching `FromStr`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of ledger operation a log record describes.
///
/// Downstream consumers (certificate views, audit exports) branch on this value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TransactionType {
    /// Token (collection) creation.
    TokenCreate,
    /// NFT mint under an existing token.
    TokenMint,
    /// Consensus topic creation.
    TopicCreate,
    /// Message submitted to a consensus topic.
    TopicMessageSubmit,
    /// Token association with an account.
    TokenAssociate,
    /// A type written by another producer; kept verbatim.
    Other(String),
}

impl TransactionType {
    /// Get the persisted name of the type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::TokenCreate => "TOKEN_CREATE",
            Self::TokenMint => "TOKEN_MINT",
            Self::TopicCreate => "TOPIC_CREATE",
            Self::TopicMessageSubmit => "TOPIC_MESSAGE_SUBMIT",
            Self::TokenAssociate => "TOKEN_ASSOCIATE",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for TransactionType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "TOKEN_CREATE" => Self::TokenCreate,
            "TOKEN_MINT" => Self::TokenMint,
            "TOPIC_CREATE" => Self::TopicCreate,
            "TOPIC_MESSAGE_SUBMIT" => Self::TopicMessageSubmit,
            "TOKEN_ASSOCIATE" => Self::TokenAssociate,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for TransactionType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<TransactionType> for String {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a log record.
///
/// Only `Pending -> Success` and `Pending -> Failed` are legal, and both are
/// driven by a mirror confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// Submitted, not yet confirmed by the mirror.
    Pending,
    /// Mirror reported `SUCCESS`.
    Success,
    /// Mirror reported any other result.
    Failed,
}

impl TransactionStatus {
    /// Get the persisted name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failed => "failed",
        }
    }

    /// Whether the status is final.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// Whether a record in this status may be moved to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Success | Self::Failed)
        )
    }

    /// Derive a terminal status from a mirror `result` code.
    #[must_use]
    pub fn from_mirror_result(result: &str) -> Self {
        if result == "SUCCESS" {
            Self::Success
        } else {
            Self::Failed
        }
    }
}

impl FromStr for TransactionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "success" => Ok(Self::Success),
            "failed" => Ok(Self::Failed),
            other => Err(ParseEnumError {
                kind: "transaction status",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which client path submitted the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    /// Signed by the application's operator account.
    #[default]
    Dapp,
    /// Signed by the user's connected wallet.
    DappWallet,
}

impl TransactionSource {
    /// Get the persisted name of the source.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dapp => "dapp",
            Self::DappWallet => "dapp_wallet",
        }
    }
}

/// Error returned when a persisted enum value is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseEnumError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}
