//! Fixed-point decimal types for prices, quantities and money
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Money is carried at two decimal places and rounded half away from zero.

use crate::errors::LedgerError;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept for cash amounts.
pub const MONEY_SCALE: u32 = 2;

/// Round a cash amount to [`MONEY_SCALE`] places, midpoint away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// True if the value already carries no more than [`MONEY_SCALE`] places.
pub fn is_money(value: Decimal) -> bool {
    round_money(value) == value
}

macro_rules! non_negative_decimal {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Decimal);

        impl $name {
            /// Wrap a decimal, rejecting negative values
            pub fn try_new(value: Decimal) -> Option<Self> {
                (value >= Decimal::ZERO).then_some(Self(value))
            }

            pub fn zero() -> Self {
                Self(Decimal::ZERO)
            }

            pub fn from_u64(value: u64) -> Self {
                Self(Decimal::from(value))
            }

            #[allow(clippy::should_implement_trait)]
            pub fn from_str(s: &str) -> Option<Self> {
                Decimal::from_str(s).ok().and_then(Self::try_new)
            }

            pub fn as_decimal(&self) -> Decimal {
                self.0
            }

            pub fn is_zero(&self) -> bool {
                self.0.is_zero()
            }

            pub fn is_positive(&self) -> bool {
                self.0 > Decimal::ZERO
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

non_negative_decimal!(
    /// Number of units of an instrument. Fractional units are allowed.
    Quantity
);
non_negative_decimal!(
    /// Price per unit of an instrument, in the order's currency
    Price
);

/// Cash value of `quantity` units at `price`, rounded to money scale.
///
/// Fails with `InvalidInput` when the product does not fit a `Decimal`.
pub fn notional(quantity: Quantity, price: Price) -> Result<Decimal, LedgerError> {
    quantity
        .as_decimal()
        .checked_mul(price.as_decimal())
        .map(round_money)
        .ok_or_else(|| {
            LedgerError::invalid_input(format!("notional of {} units at {} is out of range", quantity, price))
        })
}
