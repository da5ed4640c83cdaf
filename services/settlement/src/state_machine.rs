//! Order State Machine: legal transitions and feasibility guards
//!
//! ```text
//! created ──> confirmed ──> executed ──> settled
//!    │            │
//!    └────────────┴──> canceled
//! ```
//!
//! Confirm and execute re-check that the order could still be funded. The
//! order's own active reservation counts toward what is available, since
//! that hold was taken for this very order.

use chrono::{DateTime, Utc};
use persistence::LedgerTx;
use rust_decimal::Decimal;
use tracing::warn;
use types::errors::LedgerError;
use types::order::{Order, OrderStatus, Side};
use types::reservation::ReservationKind;

#[derive(Debug, Clone, Default)]
pub struct OrderStateMachine;

impl OrderStateMachine {
    pub fn new() -> Self {
        Self
    }

    /// Move the order to `next` or fail with `InvalidStateTransition`.
    pub fn transition(&self, order: &mut Order, next: OrderStatus, now: DateTime<Utc>) -> Result<(), LedgerError> {
        order.transition(next, now).inspect_err(|_| {
            warn!(
                order_id = %order.order_id,
                from = %order.status,
                to = %next,
                "Rejected order transition"
            );
        })
    }

    /// Buy: cash available to the customer covers the total amount.
    /// Sell: units available to the customer cover the quantity.
    pub fn check_feasibility(&self, tx: &dyn LedgerTx, order: &Order) -> Result<(), LedgerError> {
        match order.side {
            Side::Buy => {
                let account = tx.account(order.account_id)?;
                let held = own_hold(tx, order, ReservationKind::Cash)?;
                let available = account.available_cash + held;
                if available < order.total_amount {
                    return Err(LedgerError::InsufficientFunds {
                        account_id: order.account_id.to_string(),
                        required: order.total_amount.to_string(),
                        available: available.to_string(),
                    });
                }
            }
            Side::Sell => {
                let free = tx
                    .holding(order.account_id, order.asset_id)?
                    .map_or(Decimal::ZERO, |h| h.available_quantity);
                let available = free + own_hold(tx, order, ReservationKind::Asset)?;
                let required = order.quantity.as_decimal();
                if available < required {
                    return Err(LedgerError::InsufficientHoldings {
                        account_id: order.account_id.to_string(),
                        asset_id: order.asset_id.to_string(),
                        required: required.to_string(),
                        available: available.to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn own_hold(tx: &dyn LedgerTx, order: &Order, kind: ReservationKind) -> Result<Decimal, LedgerError> {
    Ok(tx
        .active_reservation(order.order_id, kind)?
        .map_or(Decimal::ZERO, |r| r.amount))
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
    use types::order::NewOrder;

    fn make_order(db: &LedgerDb, side: Side, balance: Decimal, units: Decimal) -> Order {
        db.atomic(|tx| {
            let account = Account::open(AccountKind::Customer, "USD", balance, tx.now());
            let asset_id = AssetId::new();
            if !units.is_zero() {
                let mut holding = Holding::empty(account.account_id, asset_id, tx.now());
                holding.apply_quantity(units)?;
                tx.put_holding(holding)?;
            }
            let request = NewOrder {
                account_id: account.account_id,
                asset_id,
                quantity: Quantity::from_u64(10),
                price_per_unit: Price::from_str("20.00").unwrap(),
                currency: "USD".to_string(),
                trade_date: None,
                settlement_date: None,
                owner_id: UserId::new(),
                comment: None,
            };
            tx.put_account(account)?;
            Order::create(request, side, OrderNumber::from_sequence(1), tx.now())
        })
        .unwrap()
    }

    #[test]
    fn test_illegal_transition_leaves_status() {
        let db = LedgerDb::in_memory();
        let mut order = make_order(&db, Side::Buy, dec!(1000), dec!(0));
        let machine = OrderStateMachine::new();

        let err = machine
            .transition(&mut order, OrderStatus::Settled, Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidStateTransition { .. }));
        assert_eq!(order.status, OrderStatus::Created);
    }

    #[test]
    fn test_buy_feasibility() {
        let db = LedgerDb::in_memory();
        let machine = OrderStateMachine::new();

        let funded = make_order(&db, Side::Buy, dec!(200), dec!(0));
        assert!(db.atomic(|tx| machine.check_feasibility(tx, &funded)).is_ok());

        let short = make_order(&db, Side::Buy, dec!(199.99), dec!(0));
        let err = db.atomic(|tx| machine.check_feasibility(tx, &short)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
    }

    #[test]
    fn test_sell_feasibility() {
        let db = LedgerDb::in_memory();
        let machine = OrderStateMachine::new();

        let covered = make_order(&db, Side::Sell, dec!(0), dec!(10));
        assert!(db.atomic(|tx| machine.check_feasibility(tx, &covered)).is_ok());

        let short = make_order(&db, Side::Sell, dec!(0), dec!(5));
        let err = db.atomic(|tx| machine.check_feasibility(tx, &short)).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientHoldings { .. }));
    }
}
