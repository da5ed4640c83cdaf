//! Settlement Coordinator: drives orders from creation through settlement
//!
//! Every public operation is exactly one unit of work on the store. An
//! error from any step aborts the unit and is returned unchanged, so the
//! durable order status is always one of the lifecycle states and never a
//! half-applied transition.

use crate::config::SettlementConfig;
use crate::poster::TransactionPoster;
use crate::reservation::ReservationManager;
use crate::state_machine::OrderStateMachine;
use crate::validator;
use persistence::{LedgerStore, LedgerTx};
use rust_decimal::Decimal;
use tracing::info;
use types::account::{Account, AccountKind};
use types::asset::{Asset, AssetType};
use types::errors::LedgerError;
use types::holding::Holding;
use types::ids::{AccountId, AssetId, OrderId, OrderNumber, UserId};
use types::numeric::{is_money, Quantity};
use types::order::{NewOrder, Order, OrderStatus, SettlementRequest, Side};
use types::transaction::{LedgerEntry, PostingContext, PostingPair, TransactionType};

pub struct SettlementCoordinator<S: LedgerStore> {
    store: S,
    config: SettlementConfig,
    reservations: ReservationManager,
    poster: TransactionPoster,
    machine: OrderStateMachine,
}

impl<S: LedgerStore> SettlementCoordinator<S> {
    /// Create a coordinator with default configuration
    pub fn new(store: S) -> Self {
        Self::with_config(store, SettlementConfig::default())
    }

    pub fn with_config(store: S, config: SettlementConfig) -> Self {
        Self {
            store,
            reservations: ReservationManager::new(config.clone()),
            poster: TransactionPoster::new(),
            machine: OrderStateMachine::new(),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    // ── Bootstrap ───────────────────────────────────────────────────

    /// Open the house account. There can only be one.
    pub fn open_house_account(&self, currency: &str, opening_balance: Decimal) -> Result<Account, LedgerError> {
        check_opening(currency, opening_balance)?;
        self.store.atomic(|tx| {
            if let Ok(existing) = tx.house_account_id() {
                return Err(LedgerError::invalid_input(format!(
                    "house account {} already exists",
                    existing
                )));
            }
            let account = Account::open(AccountKind::House, currency, opening_balance, tx.now());
            tx.put_account(account.clone())?;
            info!(account_id = %account.account_id, balance = %opening_balance, "House account opened");
            Ok(account)
        })
    }

    /// Return the house account, opening it if the ledger has none yet.
    pub fn ensure_house_account(&self, currency: &str, opening_balance: Decimal) -> Result<Account, LedgerError> {
        let existing = self.store.atomic(|tx| match tx.house_account_id() {
            Ok(id) => tx.account(id).map(Some),
            Err(LedgerError::AccountNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        })?;
        match existing {
            Some(account) => Ok(account),
            None => self.open_house_account(currency, opening_balance),
        }
    }

    /// Open a customer account with nothing in it. Funds arrive by deposit.
    ///
    /// The account must be in the house currency, since the house is the
    /// counterparty to every cash movement.
    pub fn open_customer_account(&self, currency: &str) -> Result<Account, LedgerError> {
        check_opening(currency, Decimal::ZERO)?;
        self.store.atomic(|tx| {
            check_house_currency(tx, currency)?;
            let account = Account::open(AccountKind::Customer, currency, Decimal::ZERO, tx.now());
            tx.put_account(account.clone())?;
            info!(account_id = %account.account_id, currency, "Customer account opened");
            Ok(account)
        })
    }

    pub fn register_asset(&self, symbol: &str, asset_type: AssetType, currency: &str) -> Result<Asset, LedgerError> {
        if symbol.trim().is_empty() {
            return Err(LedgerError::invalid_input("asset symbol is required"));
        }
        if currency.trim().is_empty() {
            return Err(LedgerError::invalid_input("currency is required"));
        }
        self.store.atomic(|tx| {
            check_house_currency(tx, currency)?;
            let asset = Asset::new(symbol, asset_type, currency);
            tx.put_asset(asset.clone())?;
            info!(asset_id = %asset.asset_id, symbol, asset_type = %asset_type, "Asset registered");
            Ok(asset)
        })
    }

    /// Add units of an instrument to the house inventory, the source of
    /// every customer purchase.
    pub fn seed_house_inventory(&self, asset_id: AssetId, quantity: Quantity) -> Result<Holding, LedgerError> {
        if !quantity.is_positive() {
            return Err(LedgerError::invalid_input("quantity must be greater than zero"));
        }
        self.store.atomic(|tx| {
            tx.asset(asset_id)?;
            let house = tx.house_account_id()?;
            let mut holding = tx
                .holding(house, asset_id)?
                .unwrap_or_else(|| Holding::empty(house, asset_id, tx.now()));
            holding.apply_quantity(quantity.as_decimal())?;
            holding.updated_at = tx.now();
            tx.put_holding(holding.clone())?;
            info!(asset_id = %asset_id, quantity = %quantity, "House inventory seeded");
            Ok(holding)
        })
    }

    // ── Order lifecycle ─────────────────────────────────────────────

    /// Insert a buy order and hold its total on the customer and the house.
    pub fn create_buy_order(&self, request: NewOrder) -> Result<Order, LedgerError> {
        self.create_order(request, Side::Buy)
    }

    /// Insert a sell order and hold its quantity on the customer's holding.
    pub fn create_sell_order(&self, request: NewOrder) -> Result<Order, LedgerError> {
        self.create_order(request, Side::Sell)
    }

    fn create_order(&self, request: NewOrder, side: Side) -> Result<Order, LedgerError> {
        self.store.atomic(|tx| {
            let account = tx.account(request.account_id)?;
            let asset = tx.asset(request.asset_id)?;
            validator::validate_new_order(&request, &account, &asset)?;

            let order_number = tx.next_order_number()?;
            let order = Order::create(request, side, order_number, tx.now())?;
            tx.put_order(order.clone())?;
            match side {
                Side::Buy => {
                    let house = tx.house_account_id()?;
                    self.reservations.reserve_cash(tx, &order, Some(house))?;
                }
                Side::Sell => {
                    self.reservations.reserve_asset(tx, &order)?;
                }
            }
            info!(
                order_id = %order.order_id,
                order_number = %order.order_number,
                side = %side,
                quantity = %order.quantity,
                total = %order.total_amount,
                "Order created"
            );
            Ok(order)
        })
    }

    pub fn confirm_order(&self, order_id: OrderId) -> Result<Order, LedgerError> {
        self.advance(order_id, OrderStatus::Confirmed)
    }

    pub fn execute_order(&self, order_id: OrderId) -> Result<Order, LedgerError> {
        self.advance(order_id, OrderStatus::Executed)
    }

    fn advance(&self, order_id: OrderId, next: OrderStatus) -> Result<Order, LedgerError> {
        self.store.atomic(|tx| {
            let mut order = tx.order(order_id)?;
            if !order.status.can_transition_to(next) {
                return Err(order.invalid_transition(next));
            }
            self.machine.check_feasibility(tx, &order)?;
            self.machine.transition(&mut order, next, tx.now())?;
            tx.put_order(order.clone())?;
            info!(order_id = %order_id, status = %next, "Order advanced");
            Ok(order)
        })
    }

    /// Cancel an open order and release whatever it holds.
    pub fn cancel_order(&self, order_id: OrderId) -> Result<Order, LedgerError> {
        self.store.atomic(|tx| self.cancel_in(tx, order_id))
    }

    pub(crate) fn cancel_in(&self, tx: &mut dyn LedgerTx, order_id: OrderId) -> Result<Order, LedgerError> {
        let mut order = tx.order(order_id)?;
        self.machine.transition(&mut order, OrderStatus::Canceled, tx.now())?;
        let released = self.reservations.release(tx, order_id)?;
        tx.put_order(order.clone())?;
        info!(order_id = %order_id, released, "Order canceled");
        Ok(order)
    }

    /// Settle an executed order.
    ///
    /// Releases the order's holds, then posts a cash pair and an instrument
    /// pair under one fresh order number, sized by the settled quantity and
    /// amount rather than the ordered ones.
    pub fn settle_order(&self, order_id: OrderId, request: SettlementRequest) -> Result<Order, LedgerError> {
        self.store.atomic(|tx| {
            let mut order = tx.order(order_id)?;
            if order.status != OrderStatus::Executed {
                return Err(order.invalid_transition(OrderStatus::Settled));
            }
            validator::validate_settlement(&order, &request)?;

            let asset_type = tx.asset(order.asset_id)?.asset_type;
            let house = tx.house_account_id()?;
            let settlement_number = tx.next_order_number()?;
            let context = PostingContext {
                transaction_type: TransactionType::for_side(order.side),
                order_number: settlement_number.clone(),
                currency: order.currency.clone(),
                price: Some(order.price_per_unit.as_decimal()),
                trade_date: request.trade_date.or(order.trade_date),
                settlement_date: request.settlement_date.or(order.settlement_date),
                comment: request.comment.clone(),
                created_by: Some(request.settled_by),
                at: tx.now(),
            };

            self.reservations.release(tx, order_id)?;

            let amount = request.settled_amount;
            let quantity = request.settled_quantity.as_decimal();
            let (cash, units) = match order.side {
                Side::Buy => (-amount, quantity),
                Side::Sell => (amount, -quantity),
            };
            self.poster
                .post_pair(tx, PostingPair::cash(&context, order.account_id, house, cash))?;
            self.poster.post_pair(
                tx,
                PostingPair::instrument(&context, order.account_id, house, order.asset_id, asset_type, units),
            )?;

            order.record_settlement(&request, settlement_number.clone(), tx.now())?;
            tx.put_order(order.clone())?;
            info!(
                order_id = %order_id,
                settlement_number = %settlement_number,
                settled_quantity = %request.settled_quantity,
                settled_amount = %amount,
                "Order settled"
            );
            Ok(order)
        })
    }

    /// Release the order's active reservations without changing its status.
    pub fn release_reservation(&self, order_id: OrderId) -> Result<usize, LedgerError> {
        self.store.atomic(|tx| {
            tx.order(order_id)?;
            self.reservations.release(tx, order_id)
        })
    }

    // ── Cash movements ──────────────────────────────────────────────

    pub fn deposit(
        &self,
        account_id: AccountId,
        amount: Decimal,
        created_by: Option<UserId>,
        comment: Option<String>,
    ) -> Result<OrderNumber, LedgerError> {
        self.store
            .atomic(|tx| self.poster.deposit(tx, account_id, amount, created_by, comment))
    }

    pub fn withdraw(
        &self,
        account_id: AccountId,
        amount: Decimal,
        created_by: Option<UserId>,
        comment: Option<String>,
    ) -> Result<OrderNumber, LedgerError> {
        self.store
            .atomic(|tx| self.poster.withdraw(tx, account_id, amount, created_by, comment))
    }

    /// Post offsetting entries for everything under `order_number`.
    pub fn reverse(
        &self,
        order_number: &OrderNumber,
        created_by: Option<UserId>,
        comment: Option<String>,
    ) -> Result<OrderNumber, LedgerError> {
        self.store
            .atomic(|tx| self.poster.reverse(tx, order_number, created_by, comment))
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn get_order(&self, order_id: OrderId) -> Result<Order, LedgerError> {
        self.store.atomic(|tx| tx.order(order_id))
    }

    pub fn orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>, LedgerError> {
        self.store.atomic(|tx| {
            tx.account(account_id)?;
            tx.orders_for_account(account_id)
        })
    }

    pub fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        self.store.atomic(|tx| tx.account(account_id))
    }

    pub fn get_asset(&self, asset_id: AssetId) -> Result<Asset, LedgerError> {
        self.store.atomic(|tx| tx.asset(asset_id))
    }

    /// The account's holding of an asset; an empty holding if it owns none.
    pub fn get_holding(&self, account_id: AccountId, asset_id: AssetId) -> Result<Holding, LedgerError> {
        self.store.atomic(|tx| {
            tx.account(account_id)?;
            Ok(tx
                .holding(account_id, asset_id)?
                .unwrap_or_else(|| Holding::empty(account_id, asset_id, tx.now())))
        })
    }

    pub fn ledger_entries(&self, order_number: &OrderNumber) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.store.atomic(|tx| tx.entries_for_order_number(order_number))
    }

    pub fn account_entries(&self, account_id: AccountId) -> Result<Vec<LedgerEntry>, LedgerError> {
        self.store.atomic(|tx| {
            tx.account(account_id)?;
            tx.entries_for_account(account_id)
        })
    }
}

fn check_house_currency(tx: &dyn LedgerTx, currency: &str) -> Result<(), LedgerError> {
    let house_id = tx.house_account_id()?;
    let house = tx.account(house_id)?;
    if house.currency != currency {
        return Err(LedgerError::invalid_input(format!(
            "currency {} does not match house currency {}",
            currency, house.currency
        )));
    }
    Ok(())
}

fn check_opening(currency: &str, opening_balance: Decimal) -> Result<(), LedgerError> {
    if currency.trim().is_empty() {
        return Err(LedgerError::invalid_input("currency is required"));
    }
    if opening_balance < Decimal::ZERO || !is_money(opening_balance) {
        return Err(LedgerError::invalid_input(format!(
            "opening balance {} must be a non-negative cash amount",
            opening_balance
        )));
    }
    Ok(())
}
