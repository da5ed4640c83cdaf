//! Reservation sweeper: cancels open orders whose holds have lapsed
//!
//! A reservation past its `reserved_until` keeps funds locked until
//! something releases it. The sweeper cancels the owning order when it is
//! still open (`created` or `confirmed`), which releases every hold of
//! that order. Executed orders are left alone: their reservations are
//! released by settlement. Each order is canceled in its own unit of work,
//! so one failure does not stop the pass.

use crate::coordinator::SettlementCoordinator;
use chrono::{DateTime, Utc};
use persistence::LedgerStore;
use std::collections::BTreeSet;
use tracing::{info, warn};
use types::errors::LedgerError;
use types::ids::OrderId;

pub struct ReservationSweeper<'a, S: LedgerStore> {
    coordinator: &'a SettlementCoordinator<S>,
}

impl<'a, S: LedgerStore> ReservationSweeper<'a, S> {
    pub fn new(coordinator: &'a SettlementCoordinator<S>) -> Self {
        Self { coordinator }
    }

    /// Open orders holding a reservation that expired before `now`.
    pub fn expired_orders(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>, LedgerError> {
        let limit = self.coordinator.config().sweep_batch_limit;
        self.coordinator.store().atomic(|tx| {
            let mut candidates = BTreeSet::new();
            for reservation in tx.active_reservations()? {
                if reservation.is_expired(now) && tx.order(reservation.order_id)?.status.is_cancelable() {
                    candidates.insert(reservation.order_id);
                }
            }
            Ok(candidates.into_iter().take(limit).collect())
        })
    }

    /// Cancel every expired open order. Returns the orders canceled.
    pub fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<OrderId>, LedgerError> {
        let mut canceled = Vec::new();
        for order_id in self.expired_orders(now)? {
            let outcome = self.coordinator.store().atomic(|tx| {
                // the order may have moved on since the scan
                if !tx.order(order_id)?.status.is_cancelable() {
                    return Ok(false);
                }
                self.coordinator.cancel_in(tx, order_id).map(|_| true)
            });
            match outcome {
                Ok(true) => canceled.push(order_id),
                Ok(false) => {}
                Err(e) => warn!(order_id = %order_id, error = %e, "Failed to cancel expired order"),
            }
        }
        if !canceled.is_empty() {
            info!(count = canceled.len(), "Expired reservations swept");
        }
        Ok(canceled)
    }
}
