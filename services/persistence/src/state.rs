//! Ledger State: the committed rows and the change sets that advance them
//!
//! `LedgerState` is only ever mutated through [`LedgerState::apply`], both
//! on the live commit path and during journal replay, so a recovered store
//! is identical to the one that crashed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use types::account::{Account, AccountKind};
use types::asset::Asset;
use types::holding::Holding;
use types::ids::{AccountId, AssetId, OrderId, OrderNumber, ReservationId, TransactionId};
use types::order::Order;
use types::reservation::{Reservation, ReservationKind};
use types::transaction::LedgerEntry;

#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pub accounts: HashMap<AccountId, Account>,
    pub holdings: HashMap<(AccountId, AssetId), Holding>,
    pub assets: HashMap<AssetId, Asset>,
    pub orders: HashMap<OrderId, Order>,
    pub reservations: HashMap<ReservationId, Reservation>,
    /// Ledger rows in posting order
    pub entries: Vec<LedgerEntry>,
    entry_index: HashMap<TransactionId, usize>,
    /// Last order-number sequence handed out
    pub order_number_seq: u64,
}

/// Holding rows are upserted or deleted, never stored at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HoldingChange {
    Upsert(Holding),
    Delete(AccountId, AssetId),
}

/// Every row written by one committed unit of work
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub accounts: Vec<Account>,
    pub holdings: Vec<HoldingChange>,
    pub assets: Vec<Asset>,
    pub orders: Vec<Order>,
    pub reservations: Vec<Reservation>,
    pub new_entries: Vec<LedgerEntry>,
    pub updated_entries: Vec<LedgerEntry>,
    pub order_number_seq: Option<u64>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.holdings.is_empty()
            && self.assets.is_empty()
            && self.orders.is_empty()
            && self.reservations.is_empty()
            && self.new_entries.is_empty()
            && self.updated_entries.is_empty()
            && self.order_number_seq.is_none()
    }
}

impl LedgerState {
    pub fn apply(&mut self, changes: ChangeSet) {
        for account in changes.accounts {
            self.accounts.insert(account.account_id, account);
        }
        for change in changes.holdings {
            match change {
                HoldingChange::Upsert(holding) => {
                    self.holdings.insert(holding.key(), holding);
                }
                HoldingChange::Delete(account_id, asset_id) => {
                    self.holdings.remove(&(account_id, asset_id));
                }
            }
        }
        for asset in changes.assets {
            self.assets.insert(asset.asset_id, asset);
        }
        for order in changes.orders {
            self.orders.insert(order.order_id, order);
        }
        for reservation in changes.reservations {
            self.reservations.insert(reservation.reservation_id, reservation);
        }
        for entry in changes.new_entries {
            self.entry_index.insert(entry.transaction_id, self.entries.len());
            self.entries.push(entry);
        }
        for entry in changes.updated_entries {
            if let Some(&index) = self.entry_index.get(&entry.transaction_id) {
                self.entries[index] = entry;
            }
        }
        if let Some(seq) = changes.order_number_seq {
            self.order_number_seq = seq;
        }
    }

    pub fn entry(&self, id: TransactionId) -> Option<&LedgerEntry> {
        self.entry_index.get(&id).map(|&index| &self.entries[index])
    }

    pub fn house_account_id(&self) -> Option<AccountId> {
        self.accounts
            .values()
            .find(|a| a.kind == AccountKind::House)
            .map(|a| a.account_id)
    }

    pub fn active_reservation(&self, order_id: OrderId, kind: ReservationKind) -> Option<&Reservation> {
        self.reservations
            .values()
            .find(|r| r.order_id == order_id && r.kind == kind && r.is_active())
    }

    pub fn entries_for_order_number<'a>(
        &'a self,
        order_number: &'a OrderNumber,
    ) -> impl Iterator<Item = &'a LedgerEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| &e.order_number == order_number)
    }
}
