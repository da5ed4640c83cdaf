//! Unit of Work: staged writes over a committed snapshot
//!
//! Reads see the overlay first, then the committed state. Nothing touches
//! the committed state until the unit is turned into a [`ChangeSet`] and
//! applied by the store, so dropping a unit is a full rollback.

use crate::state::{ChangeSet, HoldingChange, LedgerState};
use crate::store::LedgerTx;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use types::account::Account;
use types::asset::Asset;
use types::errors::LedgerError;
use types::holding::Holding;
use types::ids::{AccountId, AssetId, OrderId, OrderNumber, ReservationId, TransactionId};
use types::order::Order;
use types::reservation::{Reservation, ReservationKind};
use types::transaction::LedgerEntry;

pub struct UnitOfWork<'s> {
    base: &'s LedgerState,
    now: DateTime<Utc>,
    accounts: HashMap<AccountId, Account>,
    /// `None` marks a deleted row
    holdings: HashMap<(AccountId, AssetId), Option<Holding>>,
    assets: HashMap<AssetId, Asset>,
    orders: HashMap<OrderId, Order>,
    reservations: HashMap<ReservationId, Reservation>,
    new_entries: Vec<LedgerEntry>,
    updated_entries: HashMap<TransactionId, LedgerEntry>,
    order_number_seq: Option<u64>,
}

impl<'s> UnitOfWork<'s> {
    pub fn new(base: &'s LedgerState, now: DateTime<Utc>) -> Self {
        Self {
            base,
            now,
            accounts: HashMap::new(),
            holdings: HashMap::new(),
            assets: HashMap::new(),
            orders: HashMap::new(),
            reservations: HashMap::new(),
            new_entries: Vec::new(),
            updated_entries: HashMap::new(),
            order_number_seq: None,
        }
    }

    pub fn into_changes(self) -> ChangeSet {
        ChangeSet {
            accounts: self.accounts.into_values().collect(),
            holdings: self
                .holdings
                .into_iter()
                .map(|((account_id, asset_id), row)| match row {
                    Some(holding) => HoldingChange::Upsert(holding),
                    None => HoldingChange::Delete(account_id, asset_id),
                })
                .collect(),
            assets: self.assets.into_values().collect(),
            orders: self.orders.into_values().collect(),
            reservations: self.reservations.into_values().collect(),
            new_entries: self.new_entries,
            updated_entries: self.updated_entries.into_values().collect(),
            order_number_seq: self.order_number_seq,
        }
    }

    fn reservation_rows(&self) -> impl Iterator<Item = &Reservation> {
        let staged = self.reservations.values();
        let committed = self
            .base
            .reservations
            .values()
            .filter(|r| !self.reservations.contains_key(&r.reservation_id));
        staged.chain(committed)
    }

    fn entry_rows(&self) -> impl Iterator<Item = &LedgerEntry> {
        let committed = self
            .base
            .entries
            .iter()
            .map(|e| self.updated_entries.get(&e.transaction_id).unwrap_or(e));
        committed.chain(self.new_entries.iter())
    }
}

impl LedgerTx for UnitOfWork<'_> {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn account(&self, id: AccountId) -> Result<Account, LedgerError> {
        self.accounts
            .get(&id)
            .or_else(|| self.base.accounts.get(&id))
            .cloned()
            .ok_or_else(|| LedgerError::AccountNotFound {
                account_id: id.to_string(),
            })
    }

    fn put_account(&mut self, account: Account) -> Result<(), LedgerError> {
        if !account.check_invariant() {
            return Err(LedgerError::posting_failed(format!(
                "account {} violates balance invariant: balance {}, available {}, reserved {}",
                account.account_id, account.balance, account.available_cash, account.reserved_cash
            )));
        }
        self.accounts.insert(account.account_id, account);
        Ok(())
    }

    fn house_account_id(&self) -> Result<AccountId, LedgerError> {
        self.accounts
            .values()
            .find(|a| a.is_house())
            .map(|a| a.account_id)
            .or_else(|| self.base.house_account_id())
            .ok_or_else(|| LedgerError::AccountNotFound {
                account_id: "house".to_string(),
            })
    }

    fn reserve_cash(&mut self, id: AccountId, amount: Decimal) -> Result<bool, LedgerError> {
        let mut account = self.account(id)?;
        if account.available_cash < amount {
            return Ok(false);
        }
        account.reserve(amount)?;
        account.touch(self.now);
        self.put_account(account)?;
        Ok(true)
    }

    fn holding(&self, account: AccountId, asset: AssetId) -> Result<Option<Holding>, LedgerError> {
        let key = (account, asset);
        Ok(match self.holdings.get(&key) {
            Some(staged) => staged.clone(),
            None => self.base.holdings.get(&key).cloned(),
        })
    }

    fn put_holding(&mut self, holding: Holding) -> Result<(), LedgerError> {
        if !holding.check_invariant() {
            return Err(LedgerError::posting_failed(format!(
                "holding of asset {} on account {} violates invariant: quantity {}, available {}",
                holding.asset_id, holding.account_id, holding.quantity, holding.available_quantity
            )));
        }
        let key = holding.key();
        let row = (!holding.is_empty()).then_some(holding);
        self.holdings.insert(key, row);
        Ok(())
    }

    fn reserve_asset(
        &mut self,
        account: AccountId,
        asset: AssetId,
        quantity: Decimal,
    ) -> Result<bool, LedgerError> {
        let Some(mut holding) = self.holding(account, asset)? else {
            return Ok(false);
        };
        if holding.available_quantity < quantity {
            return Ok(false);
        }
        holding.reserve(quantity)?;
        holding.updated_at = self.now;
        self.put_holding(holding)?;
        Ok(true)
    }

    fn asset(&self, id: AssetId) -> Result<Asset, LedgerError> {
        self.assets
            .get(&id)
            .or_else(|| self.base.assets.get(&id))
            .cloned()
            .ok_or_else(|| LedgerError::AssetNotFound {
                asset_id: id.to_string(),
            })
    }

    fn put_asset(&mut self, asset: Asset) -> Result<(), LedgerError> {
        self.assets.insert(asset.asset_id, asset);
        Ok(())
    }

    fn order(&self, id: OrderId) -> Result<Order, LedgerError> {
        self.orders
            .get(&id)
            .or_else(|| self.base.orders.get(&id))
            .cloned()
            .ok_or_else(|| LedgerError::OrderNotFound {
                order_id: id.to_string(),
            })
    }

    fn put_order(&mut self, order: Order) -> Result<(), LedgerError> {
        self.orders.insert(order.order_id, order);
        Ok(())
    }

    fn orders_for_account(&self, account: AccountId) -> Result<Vec<Order>, LedgerError> {
        let staged = self.orders.values().filter(|o| o.account_id == account);
        let committed = self
            .base
            .orders
            .values()
            .filter(|o| o.account_id == account && !self.orders.contains_key(&o.order_id));
        let mut orders: Vec<Order> = staged.chain(committed).cloned().collect();
        orders.sort_by_key(|o| o.order_id);
        Ok(orders)
    }

    fn next_order_number(&mut self) -> Result<OrderNumber, LedgerError> {
        let next = self.order_number_seq.unwrap_or(self.base.order_number_seq) + 1;
        self.order_number_seq = Some(next);
        Ok(OrderNumber::from_sequence(next))
    }

    fn active_reservation(
        &self,
        order: OrderId,
        kind: ReservationKind,
    ) -> Result<Option<Reservation>, LedgerError> {
        Ok(self
            .reservation_rows()
            .find(|r| r.order_id == order && r.kind == kind && r.is_active())
            .cloned())
    }

    fn active_reservations(&self) -> Result<Vec<Reservation>, LedgerError> {
        let mut active: Vec<Reservation> = self
            .reservation_rows()
            .filter(|r| r.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|r| r.reservation_id);
        Ok(active)
    }

    fn put_reservation(&mut self, reservation: Reservation) -> Result<(), LedgerError> {
        self.reservations.insert(reservation.reservation_id, reservation);
        Ok(())
    }

    fn append_entry(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        if !entry.is_well_formed() {
            return Err(LedgerError::posting_failed(format!(
                "entry {} must carry exactly one of cash amount or asset quantity",
                entry.transaction_id
            )));
        }
        self.new_entries.push(entry);
        Ok(())
    }

    fn update_entry(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let id = entry.transaction_id;
        if let Some(staged) = self.new_entries.iter_mut().find(|e| e.transaction_id == id) {
            staged.corrected = entry.corrected;
            staged.canceled = entry.canceled;
            staged.updated_at = entry.updated_at;
            return Ok(());
        }

        let posted = self
            .updated_entries
            .get(&id)
            .or_else(|| self.base.entry(id))
            .cloned()
            .ok_or_else(|| LedgerError::posting_failed(format!("ledger entry {} not found", id)))?;
        let immutable_changed = posted.account_id != entry.account_id
            || posted.cash_amount != entry.cash_amount
            || posted.asset_quantity != entry.asset_quantity
            || posted.order_number != entry.order_number;
        if immutable_changed {
            return Err(LedgerError::posting_failed(format!(
                "ledger entry {} is immutable once posted",
                id
            )));
        }
        self.updated_entries.insert(id, entry);
        Ok(())
    }

    fn entries_for_order_number(&self, order_number: &OrderNumber) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self
            .entry_rows()
            .filter(|e| &e.order_number == order_number)
            .cloned()
            .collect())
    }

    fn entries_for_account(&self, account: AccountId) -> Result<Vec<LedgerEntry>, LedgerError> {
        Ok(self
            .entry_rows()
            .filter(|e| e.account_id == account)
            .cloned()
            .collect())
    }
}
