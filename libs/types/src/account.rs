//! Account and cash balance types
//!
//! Invariant, outside an in-flight unit of work:
//! `available_cash = balance - reserved_cash` and `available_cash >= 0`.

use crate::errors::LedgerError;
use crate::ids::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account classification. Exactly one `House` account acts as the
/// counterparty of every customer-facing movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Customer,
    House,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub account_id: AccountId,
    pub kind: AccountKind,
    pub currency: String,
    /// Total cash, including reserved cash
    pub balance: Decimal,
    pub available_cash: Decimal,
    pub reserved_cash: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped on every write
    pub version: u64,
}

impl Account {
    /// Open an account with the given starting balance, nothing reserved.
    pub fn open(
        kind: AccountKind,
        currency: impl Into<String>,
        opening_balance: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            account_id: AccountId::new(),
            kind,
            currency: currency.into(),
            balance: opening_balance,
            available_cash: opening_balance,
            reserved_cash: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn is_house(&self) -> bool {
        self.kind == AccountKind::House
    }

    pub fn check_invariant(&self) -> bool {
        self.available_cash == self.balance - self.reserved_cash
            && self.available_cash >= Decimal::ZERO
            && self.reserved_cash >= Decimal::ZERO
    }

    /// Move `amount` from available to reserved.
    pub fn reserve(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO {
            return Err(LedgerError::invalid_input("reserve amount must be non-negative"));
        }
        if amount > self.available_cash {
            return Err(LedgerError::InsufficientFunds {
                account_id: self.account_id.to_string(),
                required: amount.to_string(),
                available: self.available_cash.to_string(),
            });
        }
        self.available_cash -= amount;
        self.reserved_cash += amount;
        Ok(())
    }

    /// Move `amount` from reserved back to available.
    pub fn release(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount < Decimal::ZERO || amount > self.reserved_cash {
            return Err(LedgerError::posting_failed(format!(
                "release of {} exceeds reserved cash {} on account {}",
                amount, self.reserved_cash, self.account_id
            )));
        }
        self.reserved_cash -= amount;
        self.available_cash += amount;
        Ok(())
    }

    /// Apply a signed cash movement to balance and available cash.
    pub fn apply_cash(&mut self, delta: Decimal) -> Result<(), LedgerError> {
        let (Some(balance), Some(available)) = (
            self.balance.checked_add(delta),
            self.available_cash.checked_add(delta),
        ) else {
            return Err(LedgerError::posting_failed(format!(
                "account {} balance {} cannot absorb {}",
                self.account_id, self.balance, delta
            )));
        };
        if available < Decimal::ZERO {
            return Err(LedgerError::posting_failed(format!(
                "account {} would go negative: available {} + {}",
                self.account_id, self.available_cash, delta
            )));
        }
        self.balance = balance;
        self.available_cash = available;
        Ok(())
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
        self.version += 1;
    }
}
