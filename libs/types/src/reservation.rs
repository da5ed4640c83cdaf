//! Cash and asset reservations
//!
//! A reservation sets funds or units aside for one order. An order has at
//! most one active cash reservation and at most one active asset
//! reservation. Buy-side cash holds are mirrored on the house account.

use crate::ids::{AccountId, AssetId, OrderId, ReservationId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationKind {
    Cash,
    Asset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Reserved,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    pub order_id: OrderId,
    pub kind: ReservationKind,
    pub account_id: AccountId,
    /// Second account holding the same cash amount (the house, on buys)
    pub mirror_account_id: Option<AccountId>,
    pub asset_id: Option<AssetId>,
    /// Cash amount or asset quantity, depending on `kind`
    pub amount: Decimal,
    pub reserved_until: DateTime<Utc>,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    pub fn cash(
        order_id: OrderId,
        account_id: AccountId,
        mirror_account_id: Option<AccountId>,
        amount: Decimal,
        reserved_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reservation_id: ReservationId::new(),
            order_id,
            kind: ReservationKind::Cash,
            account_id,
            mirror_account_id,
            asset_id: None,
            amount,
            reserved_until,
            status: ReservationStatus::Reserved,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn asset(
        order_id: OrderId,
        account_id: AccountId,
        asset_id: AssetId,
        quantity: Decimal,
        reserved_until: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            reservation_id: ReservationId::new(),
            order_id,
            kind: ReservationKind::Asset,
            account_id,
            mirror_account_id: None,
            asset_id: Some(asset_id),
            amount: quantity,
            reserved_until,
            status: ReservationStatus::Reserved,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Reserved
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.reserved_until
    }

    /// True if this cash hold contributes to `account`'s reserved cash
    pub fn holds_cash_on(&self, account: AccountId) -> bool {
        self.kind == ReservationKind::Cash
            && (self.account_id == account || self.mirror_account_id == Some(account))
    }

    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.status = ReservationStatus::Inactive;
        self.updated_at = now;
    }
}
