//! Ledger Store interface
//!
//! Components never hold a global store handle: a `LedgerStore` is passed
//! to their constructors and every mutation runs inside
//! [`LedgerStore::atomic`]. Inside the closure, [`LedgerTx`] exposes row
//! primitives; returning `Err` discards every write made through it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use types::account::Account;
use types::asset::Asset;
use types::errors::LedgerError;
use types::holding::Holding;
use types::ids::{AccountId, AssetId, OrderId, OrderNumber};
use types::order::Order;
use types::reservation::{Reservation, ReservationKind};
use types::transaction::LedgerEntry;

/// Row-level access within one atomic unit of work.
pub trait LedgerTx {
    /// Commit timestamp of the unit of work
    fn now(&self) -> DateTime<Utc>;

    // ── Accounts ────────────────────────────────────────────────────

    fn account(&self, id: AccountId) -> Result<Account, LedgerError>;

    /// Write an account row; rejects rows violating the cash invariant.
    fn put_account(&mut self, account: Account) -> Result<(), LedgerError>;

    /// The account classified as `House`.
    fn house_account_id(&self) -> Result<AccountId, LedgerError>;

    /// Conditional hold: succeeds only if `available_cash >= amount`.
    ///
    /// Returns `Ok(false)` when the guard fails, leaving the row untouched.
    fn reserve_cash(&mut self, id: AccountId, amount: Decimal) -> Result<bool, LedgerError>;

    // ── Holdings ────────────────────────────────────────────────────

    fn holding(&self, account: AccountId, asset: AssetId) -> Result<Option<Holding>, LedgerError>;

    /// Upsert a holding row, deleting it when its quantity is zero.
    fn put_holding(&mut self, holding: Holding) -> Result<(), LedgerError>;

    /// Conditional hold: succeeds only if `available_quantity >= quantity`.
    fn reserve_asset(
        &mut self,
        account: AccountId,
        asset: AssetId,
        quantity: Decimal,
    ) -> Result<bool, LedgerError>;

    // ── Assets ──────────────────────────────────────────────────────

    fn asset(&self, id: AssetId) -> Result<Asset, LedgerError>;
    fn put_asset(&mut self, asset: Asset) -> Result<(), LedgerError>;

    // ── Orders ──────────────────────────────────────────────────────

    fn order(&self, id: OrderId) -> Result<Order, LedgerError>;
    fn put_order(&mut self, order: Order) -> Result<(), LedgerError>;
    fn orders_for_account(&self, account: AccountId) -> Result<Vec<Order>, LedgerError>;

    /// Draw the next value of the durable order-number sequence.
    fn next_order_number(&mut self) -> Result<OrderNumber, LedgerError>;

    // ── Reservations ────────────────────────────────────────────────

    fn active_reservation(
        &self,
        order: OrderId,
        kind: ReservationKind,
    ) -> Result<Option<Reservation>, LedgerError>;
    fn active_reservations(&self) -> Result<Vec<Reservation>, LedgerError>;
    fn put_reservation(&mut self, reservation: Reservation) -> Result<(), LedgerError>;

    // ── Ledger ──────────────────────────────────────────────────────

    /// Insert a new ledger row.
    fn append_entry(&mut self, entry: LedgerEntry) -> Result<(), LedgerError>;

    /// Rewrite the flags of a posted row. Amounts, accounts and the order
    /// number of a posted row cannot change.
    fn update_entry(&mut self, entry: LedgerEntry) -> Result<(), LedgerError>;

    fn entries_for_order_number(&self, order_number: &OrderNumber) -> Result<Vec<LedgerEntry>, LedgerError>;
    fn entries_for_account(&self, account: AccountId) -> Result<Vec<LedgerEntry>, LedgerError>;
}

/// A store whose units of work are atomic and serializable.
pub trait LedgerStore: Send + Sync {
    /// Run `work` as one unit: all of its writes commit, or none do.
    fn atomic<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, LedgerError>;
}

impl<S: LedgerStore> LedgerStore for Arc<S> {
    fn atomic<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, LedgerError>,
    {
        (**self).atomic(work)
    }
}
