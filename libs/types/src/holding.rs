//! Instrument holdings per (account, asset)
//!
//! Invariant: `0 <= available_quantity <= quantity`. The difference is the
//! quantity reserved for open sell orders. A holding whose quantity reaches
//! zero is deleted by the store, never kept as a zero row.

use crate::errors::LedgerError;
use crate::ids::{AccountId, AssetId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub quantity: Decimal,
    pub available_quantity: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Holding {
    /// An empty holding, used as the starting point for a first purchase
    pub fn empty(account_id: AccountId, asset_id: AssetId, now: DateTime<Utc>) -> Self {
        Self {
            account_id,
            asset_id,
            quantity: Decimal::ZERO,
            available_quantity: Decimal::ZERO,
            updated_at: now,
        }
    }

    pub fn key(&self) -> (AccountId, AssetId) {
        (self.account_id, self.asset_id)
    }

    pub fn reserved_quantity(&self) -> Decimal {
        self.quantity - self.available_quantity
    }

    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }

    pub fn check_invariant(&self) -> bool {
        self.available_quantity >= Decimal::ZERO && self.available_quantity <= self.quantity
    }

    pub fn reserve(&mut self, quantity: Decimal) -> Result<(), LedgerError> {
        if quantity < Decimal::ZERO {
            return Err(LedgerError::invalid_input("reserve quantity must be non-negative"));
        }
        if quantity > self.available_quantity {
            return Err(LedgerError::InsufficientHoldings {
                account_id: self.account_id.to_string(),
                asset_id: self.asset_id.to_string(),
                required: quantity.to_string(),
                available: self.available_quantity.to_string(),
            });
        }
        self.available_quantity -= quantity;
        Ok(())
    }

    pub fn release(&mut self, quantity: Decimal) -> Result<(), LedgerError> {
        if quantity < Decimal::ZERO || quantity > self.reserved_quantity() {
            return Err(LedgerError::posting_failed(format!(
                "release of {} exceeds reserved quantity {} of asset {} on account {}",
                quantity,
                self.reserved_quantity(),
                self.asset_id,
                self.account_id
            )));
        }
        self.available_quantity += quantity;
        Ok(())
    }

    /// Apply a signed quantity movement to quantity and available quantity.
    pub fn apply_quantity(&mut self, delta: Decimal) -> Result<(), LedgerError> {
        let (Some(quantity), Some(available)) = (
            self.quantity.checked_add(delta),
            self.available_quantity.checked_add(delta),
        ) else {
            return Err(LedgerError::posting_failed(format!(
                "holding of asset {} on account {} cannot absorb {}",
                self.asset_id, self.account_id, delta
            )));
        };
        if available < Decimal::ZERO {
            return Err(LedgerError::posting_failed(format!(
                "holding of asset {} on account {} would go negative: available {} + {}",
                self.asset_id, self.account_id, self.available_quantity, delta
            )));
        }
        self.quantity = quantity;
        self.available_quantity = available;
        Ok(())
    }
}
