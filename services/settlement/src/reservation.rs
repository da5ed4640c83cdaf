//! Reservation Manager: holds and releases cash and units for orders
//!
//! Holds go through the store's guarded primitives (`reserve_cash`,
//! `reserve_asset`), so two units of work racing for the same funds cannot
//! both succeed against one shortfall.

use crate::config::SettlementConfig;
use chrono::{DateTime, Duration, Utc};
use persistence::LedgerTx;
use rust_decimal::Decimal;
use tracing::debug;
use types::errors::LedgerError;
use types::ids::{AccountId, OrderId};
use types::order::Order;
use types::reservation::{Reservation, ReservationKind};

#[derive(Debug, Clone)]
pub struct ReservationManager {
    config: SettlementConfig,
}

impl ReservationManager {
    pub fn new(config: SettlementConfig) -> Self {
        Self { config }
    }

    /// Hold the order's total amount on the customer and, when given, the
    /// same amount on the house account.
    pub fn reserve_cash(
        &self,
        tx: &mut dyn LedgerTx,
        order: &Order,
        house: Option<AccountId>,
    ) -> Result<Reservation, LedgerError> {
        let amount = order.total_amount;
        hold_cash(tx, order.account_id, amount)?;
        if let Some(house) = house {
            hold_cash(tx, house, amount)?;
        }

        let now = tx.now();
        let reservation = Reservation::cash(
            order.order_id,
            order.account_id,
            house,
            amount,
            expiry(now, self.config.cash_reservation_ttl())?,
            now,
        );
        tx.put_reservation(reservation.clone())?;
        debug!(order_id = %order.order_id, amount = %amount, "Cash reserved");
        Ok(reservation)
    }

    /// Hold the order's quantity on the customer's holding.
    pub fn reserve_asset(&self, tx: &mut dyn LedgerTx, order: &Order) -> Result<Reservation, LedgerError> {
        let quantity = order.quantity.as_decimal();
        if !tx.reserve_asset(order.account_id, order.asset_id, quantity)? {
            let available = tx
                .holding(order.account_id, order.asset_id)?
                .map_or(Decimal::ZERO, |h| h.available_quantity);
            return Err(LedgerError::InsufficientHoldings {
                account_id: order.account_id.to_string(),
                asset_id: order.asset_id.to_string(),
                required: quantity.to_string(),
                available: available.to_string(),
            });
        }

        let now = tx.now();
        let reservation = Reservation::asset(
            order.order_id,
            order.account_id,
            order.asset_id,
            quantity,
            expiry(now, self.config.asset_reservation_ttl())?,
            now,
        );
        tx.put_reservation(reservation.clone())?;
        debug!(order_id = %order.order_id, quantity = %quantity, "Asset reserved");
        Ok(reservation)
    }

    /// Release every active reservation of the order and mark it inactive.
    ///
    /// Returns the number of reservations released. An order with nothing
    /// active releases nothing and succeeds.
    pub fn release(&self, tx: &mut dyn LedgerTx, order_id: OrderId) -> Result<usize, LedgerError> {
        let mut released = 0;
        for kind in [ReservationKind::Cash, ReservationKind::Asset] {
            let Some(mut reservation) = tx.active_reservation(order_id, kind)? else {
                continue;
            };
            match reservation.kind {
                ReservationKind::Cash => {
                    unhold_cash(tx, reservation.account_id, reservation.amount)?;
                    if let Some(mirror) = reservation.mirror_account_id {
                        unhold_cash(tx, mirror, reservation.amount)?;
                    }
                }
                ReservationKind::Asset => {
                    let asset_id = reservation.asset_id.ok_or_else(|| {
                        LedgerError::posting_failed(format!(
                            "asset reservation {} has no asset",
                            reservation.reservation_id
                        ))
                    })?;
                    let mut holding = tx.holding(reservation.account_id, asset_id)?.ok_or_else(|| {
                        LedgerError::posting_failed(format!(
                            "no holding of asset {} on account {} to release",
                            asset_id, reservation.account_id
                        ))
                    })?;
                    holding.release(reservation.amount)?;
                    holding.updated_at = tx.now();
                    tx.put_holding(holding)?;
                }
            }
            reservation.deactivate(tx.now());
            tx.put_reservation(reservation)?;
            released += 1;
        }
        if released > 0 {
            debug!(order_id = %order_id, released, "Reservations released");
        }
        Ok(released)
    }
}

fn hold_cash(tx: &mut dyn LedgerTx, account_id: AccountId, amount: Decimal) -> Result<(), LedgerError> {
    if tx.reserve_cash(account_id, amount)? {
        return Ok(());
    }
    let available = tx.account(account_id)?.available_cash;
    Err(LedgerError::InsufficientFunds {
        account_id: account_id.to_string(),
        required: amount.to_string(),
        available: available.to_string(),
    })
}

fn unhold_cash(tx: &mut dyn LedgerTx, account_id: AccountId, amount: Decimal) -> Result<(), LedgerError> {
    let mut account = tx.account(account_id)?;
    account.release(amount)?;
    account.touch(tx.now());
    tx.put_account(account)
}

/// When a hold taken at `now` lapses.
fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, LedgerError> {
    now.checked_add_signed(ttl)
        .ok_or_else(|| LedgerError::invalid_input(format!("reservation lifetime {} is out of range", ttl)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::{LedgerDb, LedgerStore};
    use rust_decimal_macros::dec;
    use types::account::{Account, AccountKind};
    use types::holding::Holding;
    use types::ids::{AssetId, OrderNumber, UserId};
    use types::numeric::{Price, Quantity};
    use types::order::{NewOrder, Side};

    fn make_account(db: &LedgerDb, kind: AccountKind, balance: Decimal) -> AccountId {
        db.atomic(|tx| {
            let account = Account::open(kind, "USD", balance, tx.now());
            let id = account.account_id;
            tx.put_account(account)?;
            Ok(id)
        })
        .unwrap()
    }

    fn make_order(account_id: AccountId, asset_id: AssetId, side: Side, quantity: u64) -> Order {
        let request = NewOrder {
            account_id,
            asset_id,
            quantity: Quantity::from_u64(quantity),
            price_per_unit: Price::from_str("20.00").unwrap(),
            currency: "USD".to_string(),
            trade_date: None,
            settlement_date: None,
            owner_id: UserId::new(),
            comment: None,
        };
        Order::create(request, side, OrderNumber::from_sequence(1), chrono::Utc::now()).unwrap()
    }

    #[test]
    fn test_reserve_cash_mirrors_on_house() {
        let db = LedgerDb::in_memory();
        let customer = make_account(&db, AccountKind::Customer, dec!(1000));
        let house = make_account(&db, AccountKind::House, dec!(5000));
        let manager = ReservationManager::new(SettlementConfig::default());
        let order = make_order(customer, AssetId::new(), Side::Buy, 10);

        db.atomic(|tx| manager.reserve_cash(tx, &order, Some(house))).unwrap();

        let state = db.snapshot().unwrap();
        assert_eq!(state.accounts[&customer].available_cash, dec!(800));
        assert_eq!(state.accounts[&customer].reserved_cash, dec!(200));
        assert_eq!(state.accounts[&house].reserved_cash, dec!(200));
    }

    #[test]
    fn test_oversized_ttl_is_capped() {
        let db = LedgerDb::in_memory();
        let customer = make_account(&db, AccountKind::Customer, dec!(1000));
        let config = SettlementConfig {
            cash_reservation_ttl_hours: i64::MAX,
            ..SettlementConfig::default()
        };
        let manager = ReservationManager::new(config);
        let order = make_order(customer, AssetId::new(), Side::Buy, 1);

        let reservation = db.atomic(|tx| manager.reserve_cash(tx, &order, None)).unwrap();
        assert_eq!(
            reservation.reserved_until - reservation.created_at,
            Duration::hours(crate::config::MAX_RESERVATION_TTL_HOURS)
        );
    }

    #[test]
    fn test_reserve_cash_insufficient_leaves_nothing() {
        let db = LedgerDb::in_memory();
        let customer = make_account(&db, AccountKind::Customer, dec!(1000));
        let house = make_account(&db, AccountKind::House, dec!(100));
        let manager = ReservationManager::new(SettlementConfig::default());
        let order = make_order(customer, AssetId::new(), Side::Buy, 10);

        let err = db
            .atomic(|tx| manager.reserve_cash(tx, &order, Some(house)))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));

        let state = db.snapshot().unwrap();
        assert_eq!(state.accounts[&customer].available_cash, dec!(1000));
        assert!(state.reservations.is_empty());
    }

    #[test]
    fn test_reserve_asset_without_holding() {
        let db = LedgerDb::in_memory();
        let customer = make_account(&db, AccountKind::Customer, dec!(0));
        let manager = ReservationManager::new(SettlementConfig::default());
        let order = make_order(customer, AssetId::new(), Side::Sell, 3);

        let err = db.atomic(|tx| manager.reserve_asset(tx, &order)).unwrap_err();
        match err {
            LedgerError::InsufficientHoldings { available, .. } => assert_eq!(available, "0"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_release_is_idempotent() {
        let db = LedgerDb::in_memory();
        let customer = make_account(&db, AccountKind::Customer, dec!(0));
        let asset = AssetId::new();
        db.atomic(|tx| {
            let mut holding = Holding::empty(customer, asset, tx.now());
            holding.apply_quantity(dec!(10))?;
            tx.put_holding(holding)
        })
        .unwrap();
        let manager = ReservationManager::new(SettlementConfig::default());
        let order = make_order(customer, asset, Side::Sell, 4);

        db.atomic(|tx| manager.reserve_asset(tx, &order)).unwrap();
        assert_eq!(db.atomic(|tx| manager.release(tx, order.order_id)).unwrap(), 1);
        assert_eq!(db.atomic(|tx| manager.release(tx, order.order_id)).unwrap(), 0);

        let state = db.snapshot().unwrap();
        let holding = &state.holdings[&(customer, asset)];
        assert_eq!(holding.available_quantity, dec!(10));
        assert_eq!(holding.quantity, dec!(10));
    }
}
