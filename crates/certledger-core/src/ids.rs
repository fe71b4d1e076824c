//! Identifier types for certledger.
//!
//! Local identifiers (`UserId`, `LogId`) are UUIDs assigned by the backend platform.
//! Ledger identifiers (`AccountId`, `TransactionId`) follow the ledger's own textual
//! formats and are parsed strictly so malformed ids never reach the datastore.
//!
//! # Macro-based ID Types
//!
//! The `uuid_id_type!` macro reduces boilerplate for UUID-based identifier types,
//! ensuring consistent implementation of serialization, parsing, and display traits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of digits in the nanosecond part of a transaction valid-start timestamp.
const NANOS_DIGITS: usize = 9;

/// Macro to define a UUID-based identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `uuid::Uuid` with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`
/// - `Serialize`, `Deserialize` (as string)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<String>`, `Into<String>`
macro_rules! uuid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Create a new identifier from a UUID.
            #[must_use]
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Generate a new random identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4())
            }

            /// Return the underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let uuid = uuid::Uuid::parse_str(s).map_err(|_| IdError::InvalidUuid)?;
                Ok(Self(uuid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

uuid_id_type!(UserId, "A local principal identifier (UUID issued by the platform's auth service).\n\nOwnership attribute of a log record; the ledger knows nothing about it.");
uuid_id_type!(LogId, "Surrogate row identifier of a transaction log record.");

/// A ledger account identifier in `<shard>.<realm>.<num>` form (e.g. `0.0.1001`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId {
    /// Shard number.
    pub shard: u64,
    /// Realm number.
    pub realm: u64,
    /// Account number.
    pub num: u64,
}

impl AccountId {
    /// Create an account identifier from its three components.
    #[must_use]
    pub const fn new(shard: u64, realm: u64, num: u64) -> Self {
        Self { shard, realm, num }
    }
}

impl FromStr for AccountId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::InvalidAccountId(s.to_string());

        let mut parts = s.split('.');
        let (Some(shard), Some(realm), Some(num), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        Ok(Self {
            shard: parse_digits(shard).ok_or_else(invalid)?,
            realm: parse_digits(realm).ok_or_else(invalid)?,
            num: parse_digits(num).ok_or_else(invalid)?,
        })
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({self})")
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.shard, self.realm, self.num)
    }
}

impl TryFrom<String> for AccountId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.to_string()
    }
}

/// A ledger transaction identifier: the paying account plus the transaction's
/// valid-start timestamp, written `<account>@<epochSeconds>.<nanos>`.
///
/// The identifier is known as soon as the transaction is submitted, long before
/// the mirror can report on it, which is what makes it usable as the natural key
/// of the local transaction log.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId {
    /// The account that paid for the transaction.
    pub account_id: AccountId,
    /// Valid-start seconds since the Unix epoch.
    pub valid_start_seconds: u64,
    /// Valid-start nanoseconds within the second.
    pub valid_start_nanos: u32,
}

impl TransactionId {
    /// Create a transaction identifier from its parts.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidTransactionId` if `nanos` is not below one second.
    pub fn new(account_id: AccountId, seconds: u64, nanos: u32) -> Result<Self, IdError> {
        if nanos >= 1_000_000_000 {
            return Err(IdError::InvalidTransactionId(format!(
                "{account_id}@{seconds}.{nanos}"
            )));
        }
        Ok(Self {
            account_id,
            valid_start_seconds: seconds,
            valid_start_nanos: nanos,
        })
    }

    /// Render the identifier in the mirror REST API form
    /// (`0.0.1001-1700000000-123456789`).
    #[must_use]
    pub fn to_mirror_format(&self) -> String {
        format!(
            "{}-{}-{:0width$}",
            self.account_id,
            self.valid_start_seconds,
            self.valid_start_nanos,
            width = NANOS_DIGITS
        )
    }

    /// Parse an identifier in the mirror REST API form.
    ///
    /// # Errors
    ///
    /// Returns `IdError::InvalidTransactionId` if the input is malformed.
    pub fn from_mirror_format(s: &str) -> Result<Self, IdError> {
        let invalid = || IdError::InvalidTransactionId(s.to_string());

        let mut parts = s.rsplitn(3, '-');
        let (Some(nanos), Some(seconds), Some(account)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let account_id = account.parse().map_err(|_| invalid())?;
        let seconds = parse_digits(seconds).ok_or_else(invalid)?;
        let nanos = parse_nanos(nanos).ok_or_else(invalid)?;
        Self::new(account_id, seconds, nanos)
    }
}

impl FromStr for TransactionId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || IdError::InvalidTransactionId(s.to_string());

        let (account, valid_start) = s.split_once('@').ok_or_else(invalid)?;
        let (seconds, nanos) = valid_start.split_once('.').ok_or_else(invalid)?;

        let account_id = account.parse().map_err(|_| invalid())?;
        let seconds = parse_digits(seconds).ok_or_else(invalid)?;
        let nanos = parse_nanos(nanos).ok_or_else(invalid)?;
        Self::new(account_id, seconds, nanos)
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({self})")
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}.{:0width$}",
            self.account_id,
            self.valid_start_seconds,
            self.valid_start_nanos,
            width = NANOS_DIGITS
        )
    }
}

impl TryFrom<String> for TransactionId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransactionId> for String {
    fn from(id: TransactionId) -> Self {
        id.to_string()
    }
}

/// Parse a non-empty run of ASCII digits.
fn parse_digits(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

/// Parse the nanosecond component: one to nine ASCII digits.
fn parse_nanos(s: &str) -> Option<u32> {
    if s.len() > NANOS_DIGITS {
        return None;
    }
    parse_digits(s).and_then(|n| u32::try_from(n).ok())
}

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is not a valid UUID.
    #[error("invalid UUID format")]
    InvalidUuid,

    /// The input is not a `<shard>.<realm>.<num>` account id.
    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    /// The input is not a `<account>@<seconds>.<nanos>` transaction id.
    #[error("invalid transaction id: {0}")]
    InvalidTransactionId(String),
}
