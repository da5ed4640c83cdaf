//! Ledger entries and posting pairs
//!
//! Every economic event is recorded as mirrored entries: one against the
//! customer account, one against the house account, with opposite signs.
//! An entry carries exactly one of a cash amount or an asset quantity.
//! Entries are never edited after posting except for the `corrected` and
//! `canceled` flags that mark superseded rows.

use crate::asset::AssetType;
use crate::ids::{AccountId, AssetId, OrderNumber, TransactionId, UserId};
use crate::order::Side;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Purchase,
    Sale,
    Reversal,
}

impl TransactionType {
    /// Ledger classification of a settled order
    pub fn for_side(side: Side) -> Self {
        match side {
            Side::Buy => TransactionType::Purchase,
            Side::Sell => TransactionType::Sale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transaction_id: TransactionId,
    pub transaction_type: TransactionType,
    /// Owning account
    pub account_id: AccountId,
    pub counter_account_id: AccountId,
    pub asset_id: Option<AssetId>,
    pub asset_type: Option<AssetType>,
    /// Signed cash movement, set on cash entries only
    pub cash_amount: Option<Decimal>,
    /// Signed unit movement, set on instrument entries only
    pub asset_quantity: Option<Decimal>,
    pub price: Option<Decimal>,
    pub currency: String,
    pub trade_date: Option<NaiveDate>,
    pub settlement_date: Option<NaiveDate>,
    pub order_number: OrderNumber,
    pub comment: Option<String>,
    pub corrected: bool,
    pub canceled: bool,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn is_cash(&self) -> bool {
        self.cash_amount.is_some()
    }

    /// Exactly one side populated
    pub fn is_well_formed(&self) -> bool {
        self.cash_amount.is_some() != self.asset_quantity.is_some()
            && (self.asset_quantity.is_none() || self.asset_id.is_some())
    }

    /// The populated amount, cash or quantity
    pub fn signed_amount(&self) -> Decimal {
        self.cash_amount
            .or(self.asset_quantity)
            .unwrap_or(Decimal::ZERO)
    }

    /// A new entry undoing this one, under `order_number`.
    pub fn reversal(&self, order_number: OrderNumber, context: &PostingContext) -> Self {
        Self {
            transaction_id: TransactionId::new(),
            transaction_type: TransactionType::Reversal,
            cash_amount: self.cash_amount.map(|a| -a),
            asset_quantity: self.asset_quantity.map(|q| -q),
            order_number,
            comment: context.comment.clone(),
            corrected: false,
            canceled: false,
            created_by: context.created_by,
            created_at: context.at,
            updated_at: context.at,
            ..self.clone()
        }
    }
}

/// Fields shared by every entry of one economic event
#[derive(Debug, Clone, PartialEq)]
pub struct PostingContext {
    pub transaction_type: TransactionType,
    pub order_number: OrderNumber,
    pub currency: String,
    pub price: Option<Decimal>,
    pub trade_date: Option<NaiveDate>,
    pub settlement_date: Option<NaiveDate>,
    pub comment: Option<String>,
    pub created_by: Option<UserId>,
    pub at: DateTime<Utc>,
}

impl PostingContext {
    fn entry(
        &self,
        account_id: AccountId,
        counter_account_id: AccountId,
        cash_amount: Option<Decimal>,
        asset: Option<(AssetId, AssetType, Decimal)>,
    ) -> LedgerEntry {
        LedgerEntry {
            transaction_id: TransactionId::new(),
            transaction_type: self.transaction_type,
            account_id,
            counter_account_id,
            asset_id: asset.map(|(id, _, _)| id),
            asset_type: asset.map(|(_, kind, _)| kind),
            cash_amount,
            asset_quantity: asset.map(|(_, _, qty)| qty),
            price: self.price,
            currency: self.currency.clone(),
            trade_date: self.trade_date,
            settlement_date: self.settlement_date,
            order_number: self.order_number.clone(),
            comment: self.comment.clone(),
            corrected: false,
            canceled: false,
            created_by: self.created_by,
            created_at: self.at,
            updated_at: self.at,
        }
    }
}

/// Customer leg and its house mirror image
#[derive(Debug, Clone, PartialEq)]
pub struct PostingPair {
    pub customer: LedgerEntry,
    pub house: LedgerEntry,
}

impl PostingPair {
    /// Cash pair: customer moves by `customer_amount`, house by its negation.
    pub fn cash(
        context: &PostingContext,
        customer: AccountId,
        house: AccountId,
        customer_amount: Decimal,
    ) -> Self {
        Self {
            customer: context.entry(customer, house, Some(customer_amount), None),
            house: context.entry(house, customer, Some(-customer_amount), None),
        }
    }

    /// Instrument pair: customer moves by `customer_quantity` units.
    pub fn instrument(
        context: &PostingContext,
        customer: AccountId,
        house: AccountId,
        asset_id: AssetId,
        asset_type: AssetType,
        customer_quantity: Decimal,
    ) -> Self {
        Self {
            customer: context.entry(
                customer,
                house,
                None,
                Some((asset_id, asset_type, customer_quantity)),
            ),
            house: context.entry(
                house,
                customer,
                None,
                Some((asset_id, asset_type, -customer_quantity)),
            ),
        }
    }

    /// Opposite accounts, negated amounts of the same kind, one order number.
    pub fn is_mirrored(&self) -> bool {
        let (c, h) = (&self.customer, &self.house);
        c.is_well_formed()
            && h.is_well_formed()
            && c.account_id == h.counter_account_id
            && h.account_id == c.counter_account_id
            && c.account_id != h.account_id
            && c.is_cash() == h.is_cash()
            && c.asset_id == h.asset_id
            && c.order_number == h.order_number
            && c.signed_amount() + h.signed_amount() == Decimal::ZERO
    }

    pub fn into_entries(self) -> [LedgerEntry; 2] {
        [self.customer, self.house]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn context(kind: TransactionType) -> PostingContext {
        PostingContext {
            transaction_type: kind,
            order_number: OrderNumber::from_sequence(7),
            currency: "USD".to_string(),
            price: Some(dec!(20)),
            trade_date: None,
            settlement_date: None,
            comment: None,
            created_by: None,
            at: Utc::now(),
        }
    }

    #[test]
    fn test_transaction_type_for_side() {
        assert_eq!(TransactionType::for_side(Side::Buy), TransactionType::Purchase);
        assert_eq!(TransactionType::for_side(Side::Sell), TransactionType::Sale);
    }

    #[test]
    fn test_cash_pair_is_mirrored() {
        let pair = PostingPair::cash(&context(TransactionType::Deposit), AccountId::new(), AccountId::new(), dec!(50));
        assert!(pair.is_mirrored());
        assert_eq!(pair.customer.cash_amount, Some(dec!(50)));
        assert_eq!(pair.house.cash_amount, Some(dec!(-50)));
        assert!(pair.customer.asset_quantity.is_none());
    }

    #[test]
    fn test_instrument_pair_is_mirrored() {
        let pair = PostingPair::instrument(
            &context(TransactionType::Purchase),
            AccountId::new(),
            AccountId::new(),
            AssetId::new(),
            AssetType::Equity,
            dec!(10),
        );
        assert!(pair.is_mirrored());
        assert_eq!(pair.house.asset_quantity, Some(dec!(-10)));
        assert_eq!(pair.customer.asset_type, Some(AssetType::Equity));
    }

    #[test]
    fn test_unbalanced_pair_is_rejected() {
        let mut pair = PostingPair::cash(&context(TransactionType::Deposit), AccountId::new(), AccountId::new(), dec!(50));
        pair.house.cash_amount = Some(dec!(-49.99));
        assert!(!pair.is_mirrored());
    }

    #[test]
    fn test_same_account_pair_is_rejected() {
        let account = AccountId::new();
        let pair = PostingPair::cash(&context(TransactionType::Deposit), account, account, dec!(5));
        assert!(!pair.is_mirrored());
    }

    #[test]
    fn test_entry_with_both_sides_is_malformed() {
        let mut pair = PostingPair::cash(&context(TransactionType::Deposit), AccountId::new(), AccountId::new(), dec!(5));
        pair.customer.asset_quantity = Some(dec!(1));
        assert!(!pair.customer.is_well_formed());
        assert!(!pair.is_mirrored());
    }

    #[test]
    fn test_reversal_negates() {
        let ctx = context(TransactionType::Deposit);
        let pair = PostingPair::cash(&ctx, AccountId::new(), AccountId::new(), dec!(50));
        let reversed = pair.customer.reversal(OrderNumber::from_sequence(8), &ctx);
        assert_eq!(reversed.cash_amount, Some(dec!(-50)));
        assert_eq!(reversed.transaction_type, TransactionType::Reversal);
        assert_eq!(reversed.account_id, pair.customer.account_id);
        assert_ne!(reversed.transaction_id, pair.customer.transaction_id);
    }
}
