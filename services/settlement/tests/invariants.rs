//! Ledger invariants under random operation sequences
//!
//! After every operation, successful or not:
//! - entries under any order number net to zero, per cash and per asset
//! - no available cash or available quantity is negative
//! - reserved cash equals the sum of active cash holds on the account
//! - reserved units equal the sum of active asset holds on the holding
//! - settling an order that is not executed fails and changes nothing

use persistence::state::LedgerState;
use persistence::LedgerDb;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use settlement::SettlementCoordinator;
use std::collections::HashMap;
use types::asset::AssetType;
use types::errors::LedgerError;
use types::ids::{AccountId, AssetId, OrderId, OrderNumber, UserId};
use types::numeric::{Price, Quantity};
use types::order::{NewOrder, OrderStatus, SettlementRequest};
use types::reservation::ReservationKind;

#[derive(Debug, Clone)]
enum Op {
    Deposit { customer: usize, cents: u64 },
    Withdraw { customer: usize, cents: u64 },
    Buy { customer: usize, quantity: u64, price_cents: u64 },
    Sell { customer: usize, quantity: u64, price_cents: u64 },
    Confirm(usize),
    Execute(usize),
    Settle(usize),
    Cancel(usize),
    Release(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..2usize, 1..200_000u64).prop_map(|(customer, cents)| Op::Deposit { customer, cents }),
        (0..2usize, 1..100_000u64).prop_map(|(customer, cents)| Op::Withdraw { customer, cents }),
        (0..2usize, 1..20u64, 1..10_000u64).prop_map(|(customer, quantity, price_cents)| Op::Buy {
            customer,
            quantity,
            price_cents
        }),
        (0..2usize, 1..20u64, 1..10_000u64).prop_map(|(customer, quantity, price_cents)| Op::Sell {
            customer,
            quantity,
            price_cents
        }),
        (0..64usize).prop_map(Op::Confirm),
        (0..64usize).prop_map(Op::Execute),
        (0..64usize).prop_map(Op::Settle),
        (0..64usize).prop_map(Op::Cancel),
        (0..64usize).prop_map(Op::Release),
    ]
}

fn cents(value: u64) -> Decimal {
    Decimal::new(value as i64, 2)
}

fn check_invariants(state: &LedgerState) -> Result<(), TestCaseError> {
    let mut nets: HashMap<(OrderNumber, Option<AssetId>), Decimal> = HashMap::new();
    for entry in &state.entries {
        let key = if entry.is_cash() { None } else { entry.asset_id };
        *nets.entry((entry.order_number.clone(), key)).or_default() += entry.signed_amount();
    }
    for ((number, asset), net) in &nets {
        prop_assert_eq!(*net, Decimal::ZERO, "order number {} ({:?}) nets to {}", number, asset, net);
    }

    for account in state.accounts.values() {
        prop_assert!(account.check_invariant(), "account invariant broken: {:?}", account);
        let held: Decimal = state
            .reservations
            .values()
            .filter(|r| r.is_active() && r.holds_cash_on(account.account_id))
            .map(|r| r.amount)
            .sum();
        prop_assert_eq!(account.reserved_cash, held);
    }

    for holding in state.holdings.values() {
        prop_assert!(holding.check_invariant(), "holding invariant broken: {:?}", holding);
        let held: Decimal = state
            .reservations
            .values()
            .filter(|r| {
                r.is_active()
                    && r.kind == ReservationKind::Asset
                    && r.account_id == holding.account_id
                    && r.asset_id == Some(holding.asset_id)
            })
            .map(|r| r.amount)
            .sum();
        prop_assert_eq!(holding.reserved_quantity(), held);
    }
    Ok(())
}

struct World {
    coordinator: SettlementCoordinator<LedgerDb>,
    customers: [AccountId; 2],
    asset: AssetId,
    orders: Vec<OrderId>,
}

impl World {
    fn new() -> Self {
        let coordinator = SettlementCoordinator::new(LedgerDb::in_memory());
        coordinator.open_house_account("USD", dec!(10000000.00)).unwrap();
        let asset = coordinator
            .register_asset("ACME", AssetType::Equity, "USD")
            .unwrap()
            .asset_id;
        coordinator
            .seed_house_inventory(asset, Quantity::from_u64(100_000))
            .unwrap();
        let customers = [
            coordinator.open_customer_account("USD").unwrap().account_id,
            coordinator.open_customer_account("USD").unwrap().account_id,
        ];
        Self {
            coordinator,
            customers,
            asset,
            orders: Vec::new(),
        }
    }

    fn request(&self, customer: usize, quantity: u64, price_cents: u64) -> NewOrder {
        NewOrder {
            account_id: self.customers[customer],
            asset_id: self.asset,
            quantity: Quantity::from_u64(quantity),
            price_per_unit: Price::try_new(cents(price_cents)).unwrap(),
            currency: "USD".to_string(),
            trade_date: None,
            settlement_date: None,
            owner_id: UserId::new(),
            comment: None,
        }
    }

    fn order_at(&self, index: usize) -> Option<OrderId> {
        if self.orders.is_empty() {
            None
        } else {
            Some(self.orders[index % self.orders.len()])
        }
    }

    fn run(&mut self, op: &Op) -> Result<(), TestCaseError> {
        match *op {
            Op::Deposit { customer, cents: amount } => {
                let _ = self
                    .coordinator
                    .deposit(self.customers[customer], cents(amount), None, None);
            }
            Op::Withdraw { customer, cents: amount } => {
                let _ = self
                    .coordinator
                    .withdraw(self.customers[customer], cents(amount), None, None);
            }
            Op::Buy { customer, quantity, price_cents } => {
                let request = self.request(customer, quantity, price_cents);
                if let Ok(order) = self.coordinator.create_buy_order(request) {
                    self.orders.push(order.order_id);
                }
            }
            Op::Sell { customer, quantity, price_cents } => {
                let request = self.request(customer, quantity, price_cents);
                if let Ok(order) = self.coordinator.create_sell_order(request) {
                    self.orders.push(order.order_id);
                }
            }
            Op::Confirm(i) => {
                if let Some(id) = self.order_at(i) {
                    let _ = self.coordinator.confirm_order(id);
                }
            }
            Op::Execute(i) => {
                if let Some(id) = self.order_at(i) {
                    let _ = self.coordinator.execute_order(id);
                }
            }
            Op::Settle(i) => {
                if let Some(id) = self.order_at(i) {
                    let before = self.coordinator.get_order(id).unwrap();
                    let request = SettlementRequest {
                        settled_quantity: before.quantity,
                        settled_amount: before.total_amount,
                        trade_date: None,
                        settlement_date: None,
                        comment: None,
                        settled_by: UserId::new(),
                    };
                    let result = self.coordinator.settle_order(id, request);
                    if before.status != OrderStatus::Executed {
                        prop_assert!(
                            matches!(result, Err(LedgerError::InvalidStateTransition { .. })),
                            "settling a {} order returned {:?}",
                            before.status,
                            result
                        );
                        prop_assert_eq!(self.coordinator.get_order(id).unwrap(), before);
                    }
                }
            }
            Op::Cancel(i) => {
                if let Some(id) = self.order_at(i) {
                    let _ = self.coordinator.cancel_order(id);
                }
            }
            Op::Release(i) => {
                if let Some(id) = self.order_at(i) {
                    let first = self.coordinator.release_reservation(id).unwrap();
                    let second = self.coordinator.release_reservation(id).unwrap();
                    prop_assert!(first <= 2);
                    prop_assert_eq!(second, 0);
                }
            }
        }
        Ok(())
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn test_random_sequences_keep_ledger_consistent(ops in prop::collection::vec(op_strategy(), 1..60)) {
        let mut world = World::new();
        for op in &ops {
            world.run(op)?;
            check_invariants(&world.coordinator.store().snapshot().unwrap())?;
        }
    }
}
