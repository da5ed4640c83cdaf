//! Identifier types for ledger entities
//!
//! Row identifiers use UUID v7 so they sort by creation time. Order numbers
//! are the human-readable references printed on confirmations and carried by
//! every ledger entry belonging to one economic event.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new identifier stamped with the current time
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an order
    OrderId
);
uuid_id!(
    /// Unique identifier for a customer or house account
    AccountId
);
uuid_id!(
    /// Unique identifier for a tradable instrument
    AssetId
);
uuid_id!(
    /// Unique identifier for a single ledger entry
    TransactionId
);
uuid_id!(
    /// Unique identifier for a cash or asset hold
    ReservationId
);
uuid_id!(
    /// Identity of the operator or customer that caused a change
    UserId
);

/// Leading digit shared by every order number.
pub const ORDER_NUMBER_PREFIX: char = '4';

/// Zero-padded width of the sequence part of an order number.
pub const ORDER_NUMBER_SEQUENCE_WIDTH: usize = 9;

/// Human-readable order reference: digits only, fixed prefix.
///
/// Generated from a durable store sequence, e.g. sequence `17` becomes
/// `"4000000017"`. Every ledger entry of one economic event shares the
/// same number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub fn from_sequence(sequence: u64) -> Self {
        Self(format!(
            "{ORDER_NUMBER_PREFIX}{sequence:0width$}",
            width = ORDER_NUMBER_SEQUENCE_WIDTH
        ))
    }

    /// Parse an externally supplied order number, returning None if malformed
    pub fn parse(s: &str) -> Option<Self> {
        let well_formed = s.len() > 1
            && s.starts_with(ORDER_NUMBER_PREFIX)
            && s.bytes().all(|b| b.is_ascii_digit());
        well_formed.then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
