//! Transaction Poster: mirrored ledger pairs and their balance effects
//!
//! Cash legs move `balance` and `available_cash`; instrument legs move
//! holding `quantity` and `available_quantity`, creating the holding on
//! first receipt and dropping it when it reaches zero. The poster runs
//! inside the caller's unit of work, so a failure on any leg discards the
//! others.

use crate::validator::validate_cash_amount;
use persistence::LedgerTx;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};
use types::errors::LedgerError;
use types::holding::Holding;
use types::ids::{AccountId, AssetId, OrderNumber, UserId};
use types::transaction::{LedgerEntry, PostingContext, PostingPair, TransactionType};

#[derive(Debug, Clone, Default)]
pub struct TransactionPoster;

impl TransactionPoster {
    pub fn new() -> Self {
        Self
    }

    /// Apply both legs of a mirrored pair and insert both rows.
    pub fn post_pair(&self, tx: &mut dyn LedgerTx, pair: PostingPair) -> Result<(), LedgerError> {
        if !pair.is_mirrored() {
            return Err(LedgerError::posting_failed(format!(
                "legs of order number {} are not mirror images",
                pair.customer.order_number
            )));
        }
        self.post_entries(tx, &pair.into_entries())
    }

    fn post_entries(&self, tx: &mut dyn LedgerTx, entries: &[LedgerEntry]) -> Result<(), LedgerError> {
        for entry in entries {
            apply_leg(tx, entry)?;
        }
        for entry in entries {
            tx.append_entry(entry.clone())?;
        }
        Ok(())
    }

    /// Credit a customer with cash paid in from outside, house on the other side.
    pub fn deposit(
        &self,
        tx: &mut dyn LedgerTx,
        account_id: AccountId,
        amount: Decimal,
        created_by: Option<UserId>,
        comment: Option<String>,
    ) -> Result<OrderNumber, LedgerError> {
        self.post_cash_movement(tx, TransactionType::Deposit, account_id, amount, created_by, comment)
    }

    /// Pay cash out of a customer account. Reserved cash cannot be withdrawn.
    pub fn withdraw(
        &self,
        tx: &mut dyn LedgerTx,
        account_id: AccountId,
        amount: Decimal,
        created_by: Option<UserId>,
        comment: Option<String>,
    ) -> Result<OrderNumber, LedgerError> {
        validate_cash_amount(amount)?;
        let account = tx.account(account_id)?;
        if account.available_cash < amount {
            return Err(LedgerError::InsufficientFunds {
                account_id: account_id.to_string(),
                required: amount.to_string(),
                available: account.available_cash.to_string(),
            });
        }
        self.post_cash_movement(tx, TransactionType::Withdrawal, account_id, -amount, created_by, comment)
    }

    fn post_cash_movement(
        &self,
        tx: &mut dyn LedgerTx,
        transaction_type: TransactionType,
        account_id: AccountId,
        customer_amount: Decimal,
        created_by: Option<UserId>,
        comment: Option<String>,
    ) -> Result<OrderNumber, LedgerError> {
        validate_cash_amount(customer_amount.abs())?;
        let account = tx.account(account_id)?;
        if account.is_house() {
            return Err(LedgerError::invalid_input("cash movements target customer accounts"));
        }
        let house_id = tx.house_account_id()?;
        let house = tx.account(house_id)?;
        if house.currency != account.currency {
            return Err(LedgerError::invalid_input(format!(
                "account currency {} does not match house currency {}",
                account.currency, house.currency
            )));
        }
        let order_number = tx.next_order_number()?;
        let context = PostingContext {
            transaction_type,
            order_number: order_number.clone(),
            currency: account.currency.clone(),
            price: None,
            trade_date: Some(tx.now().date_naive()),
            settlement_date: Some(tx.now().date_naive()),
            comment,
            created_by,
            at: tx.now(),
        };
        self.post_pair(tx, PostingPair::cash(&context, account_id, house.account_id, customer_amount))?;
        info!(
            account_id = %account_id,
            amount = %customer_amount,
            order_number = %order_number,
            kind = ?transaction_type,
            "Cash movement posted"
        );
        Ok(order_number)
    }

    /// Undo every live entry posted under `order_number`.
    ///
    /// The offsetting rows share a fresh order number; the originals are
    /// flagged `corrected` and stay in the ledger.
    pub fn reverse(
        &self,
        tx: &mut dyn LedgerTx,
        order_number: &OrderNumber,
        created_by: Option<UserId>,
        comment: Option<String>,
    ) -> Result<OrderNumber, LedgerError> {
        let originals = tx.entries_for_order_number(order_number)?;
        if originals.is_empty() {
            return Err(LedgerError::invalid_input(format!(
                "no ledger entries under order number {}",
                order_number
            )));
        }
        if originals.iter().any(|e| e.corrected || e.canceled) {
            return Err(LedgerError::InvalidStateTransition {
                order_id: order_number.to_string(),
                from: "corrected".to_string(),
                to: "reversed".to_string(),
            });
        }

        let reversal_number = tx.next_order_number()?;
        let first = &originals[0];
        let context = PostingContext {
            transaction_type: TransactionType::Reversal,
            order_number: reversal_number.clone(),
            currency: first.currency.clone(),
            price: first.price,
            trade_date: first.trade_date,
            settlement_date: first.settlement_date,
            comment,
            created_by,
            at: tx.now(),
        };
        let reversals: Vec<LedgerEntry> = originals
            .iter()
            .map(|e| e.reversal(reversal_number.clone(), &context))
            .collect();
        check_nets_to_zero(&reversals)?;
        self.post_entries(tx, &reversals)?;

        for mut original in originals {
            original.corrected = true;
            original.updated_at = tx.now();
            tx.update_entry(original)?;
        }
        info!(
            order_number = %order_number,
            reversal_number = %reversal_number,
            entries = reversals.len(),
            "Ledger entries reversed"
        );
        Ok(reversal_number)
    }
}

fn apply_leg(tx: &mut dyn LedgerTx, entry: &LedgerEntry) -> Result<(), LedgerError> {
    let mut account = tx.account(entry.account_id).map_err(|e| match e {
        LedgerError::AccountNotFound { account_id } => {
            LedgerError::posting_failed(format!("account {} not found", account_id))
        }
        other => other,
    })?;

    match (entry.cash_amount, entry.asset_quantity, entry.asset_id) {
        (Some(amount), None, _) => {
            account.apply_cash(amount)?;
            account.touch(tx.now());
            tx.put_account(account)?;
        }
        (None, Some(quantity), Some(asset_id)) => {
            let mut holding = tx
                .holding(entry.account_id, asset_id)?
                .unwrap_or_else(|| Holding::empty(entry.account_id, asset_id, tx.now()));
            holding.apply_quantity(quantity)?;
            holding.updated_at = tx.now();
            tx.put_holding(holding)?;
        }
        _ => {
            return Err(LedgerError::posting_failed(format!(
                "entry {} carries neither a cash amount nor an asset quantity",
                entry.transaction_id
            )));
        }
    }
    debug!(
        transaction_id = %entry.transaction_id,
        account_id = %entry.account_id,
        amount = %entry.signed_amount(),
        "Leg applied"
    );
    Ok(())
}

fn check_nets_to_zero(entries: &[LedgerEntry]) -> Result<(), LedgerError> {
    let mut sums: HashMap<Option<AssetId>, Decimal> = HashMap::new();
    for entry in entries {
        let key = if entry.is_cash() { None } else { entry.asset_id };
        *sums.entry(key).or_default() += entry.signed_amount();
    }
    match sums.into_iter().find(|(_, sum)| !sum.is_zero()) {
        Some((key, sum)) => Err(LedgerError::posting_failed(format!(
            "entries do not balance for {}: net {}",
            key.map_or_else(|| "cash".to_string(), |id| id.to_string()),
            sum
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::{LedgerDb, LedgerStore};
    use rust_decimal_macros::dec;
    use types::account::{Account, AccountKind};

    fn setup(customer_balance: Decimal) -> (LedgerDb, AccountId, AccountId) {
        let db = LedgerDb::in_memory();
        let (customer, house) = db
            .atomic(|tx| {
                let house = Account::open(AccountKind::House, "USD", dec!(10000), tx.now());
                let customer = Account::open(AccountKind::Customer, "USD", customer_balance, tx.now());
                let ids = (customer.account_id, house.account_id);
                tx.put_account(house)?;
                tx.put_account(customer)?;
                Ok(ids)
            })
            .unwrap();
        (db, customer, house)
    }

    #[test]
    fn test_deposit_moves_both_sides() {
        let (db, customer, house) = setup(dec!(100));
        let poster = TransactionPoster::new();
        let number = db
            .atomic(|tx| poster.deposit(tx, customer, dec!(50), None, None))
            .unwrap();

        let state = db.snapshot().unwrap();
        assert_eq!(state.accounts[&customer].balance, dec!(150));
        assert_eq!(state.accounts[&house].balance, dec!(9950));
        let entries: Vec<_> = state.entries_for_order_number(&number).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries.iter().map(|e| e.signed_amount()).sum::<Decimal>(), Decimal::ZERO);
    }

    #[test]
    fn test_deposit_in_foreign_currency_rejected() {
        let (db, _, house) = setup(dec!(100));
        let poster = TransactionPoster::new();
        let foreign = db
            .atomic(|tx| {
                let account = Account::open(AccountKind::Customer, "EUR", Decimal::ZERO, tx.now());
                let id = account.account_id;
                tx.put_account(account)?;
                Ok(id)
            })
            .unwrap();

        let err = db
            .atomic(|tx| poster.deposit(tx, foreign, dec!(100), None, None))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
        let state = db.snapshot().unwrap();
        assert_eq!(state.accounts[&house].balance, dec!(10000));
        assert_eq!(state.accounts[&foreign].balance, Decimal::ZERO);
    }

    #[test]
    fn test_oversized_deposit_fails_cleanly() {
        let (db, customer, house) = setup(dec!(100));
        let poster = TransactionPoster::new();
        let err = db
            .atomic(|tx| poster.deposit(tx, customer, Decimal::MAX, None, None))
            .unwrap_err();
        assert!(matches!(err, LedgerError::LedgerPostingFailed { .. }));

        db.atomic(|tx| poster.deposit(tx, customer, dec!(1), None, None))
            .unwrap();
        let state = db.snapshot().unwrap();
        assert_eq!(state.accounts[&customer].balance, dec!(101));
        assert_eq!(state.accounts[&house].balance, dec!(9999));
    }

    #[test]
    fn test_unmirrored_pair_rejected() {
        let (db, customer, house) = setup(dec!(100));
        let poster = TransactionPoster::new();
        let err = db
            .atomic(|tx| {
                let context = PostingContext {
                    transaction_type: TransactionType::Deposit,
                    order_number: tx.next_order_number()?,
                    currency: "USD".to_string(),
                    price: None,
                    trade_date: None,
                    settlement_date: None,
                    comment: None,
                    created_by: None,
                    at: tx.now(),
                };
                let mut pair = PostingPair::cash(&context, customer, house, dec!(10));
                pair.house.cash_amount = Some(dec!(-9));
                poster.post_pair(tx, pair)
            })
            .unwrap_err();
        assert!(matches!(err, LedgerError::LedgerPostingFailed { .. }));
        assert!(db.snapshot().unwrap().entries.is_empty());
    }

    #[test]
    fn test_missing_account_fails_posting() {
        let (db, _, _) = setup(dec!(100));
        let poster = TransactionPoster::new();
        let err = db
            .atomic(|tx| poster.deposit(tx, AccountId::new(), dec!(5), None, None))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_withdraw_insufficient() {
        let (db, customer, _) = setup(dec!(40));
        let poster = TransactionPoster::new();
        let err = db
            .atomic(|tx| poster.withdraw(tx, customer, dec!(40.01), None, None))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_reverse_deposit_and_reject_second_reversal() {
        let (db, customer, house) = setup(dec!(100));
        let poster = TransactionPoster::new();
        let number = db
            .atomic(|tx| poster.deposit(tx, customer, dec!(50), None, None))
            .unwrap();
        let reversal = db
            .atomic(|tx| poster.reverse(tx, &number, None, Some("keyed twice".to_string())))
            .unwrap();
        assert_ne!(reversal, number);

        let state = db.snapshot().unwrap();
        assert_eq!(state.accounts[&customer].balance, dec!(100));
        assert_eq!(state.accounts[&house].balance, dec!(10000));
        assert!(state.entries_for_order_number(&number).all(|e| e.corrected));
        assert!(state
            .entries_for_order_number(&reversal)
            .all(|e| e.transaction_type == TransactionType::Reversal && !e.corrected));

        let err = db.atomic(|tx| poster.reverse(tx, &number, None, None)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_reverse_unknown_number() {
        let (db, _, _) = setup(dec!(100));
        let poster = TransactionPoster::new();
        let err = db
            .atomic(|tx| poster.reverse(tx, &OrderNumber::from_sequence(99), None, None))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidInput(_)));
    }
}
