//! Input validation for orders, settlements and cash movements
//!
//! Every check returns `InvalidInput` on failure. Feasibility (funds and
//! holdings) is not checked here; that belongs to the reservation and
//! state-machine steps, which run against live balances.

use rust_decimal::Decimal;
use types::account::Account;
use types::asset::Asset;
use types::errors::LedgerError;
use types::numeric::is_money;
use types::order::{NewOrder, Order, SettlementRequest};

/// Validate a new order against its account and instrument.
///
/// Checks performed (in order):
/// 1. Account is a customer account
/// 2. Quantity and price are positive
/// 3. Currency is present and matches the account and the instrument
/// 4. Trade date does not follow settlement date
pub fn validate_new_order(order: &NewOrder, account: &Account, asset: &Asset) -> Result<(), LedgerError> {
    if account.is_house() {
        return Err(LedgerError::invalid_input("orders cannot be placed on the house account"));
    }
    if !order.quantity.is_positive() {
        return Err(LedgerError::invalid_input("quantity must be greater than zero"));
    }
    if !order.price_per_unit.is_positive() {
        return Err(LedgerError::invalid_input("price per unit must be greater than zero"));
    }
    if order.currency.trim().is_empty() {
        return Err(LedgerError::invalid_input("currency is required"));
    }
    if order.currency != account.currency {
        return Err(LedgerError::invalid_input(format!(
            "order currency {} does not match account currency {}",
            order.currency, account.currency
        )));
    }
    if order.currency != asset.currency {
        return Err(LedgerError::invalid_input(format!(
            "order currency {} does not match {} quote currency {}",
            order.currency, asset.symbol, asset.currency
        )));
    }
    if let (Some(trade), Some(settle)) = (order.trade_date, order.settlement_date) {
        if trade > settle {
            return Err(LedgerError::invalid_input("trade date is after settlement date"));
        }
    }
    Ok(())
}

/// Validate a settlement instruction against the order it settles.
pub fn validate_settlement(order: &Order, request: &SettlementRequest) -> Result<(), LedgerError> {
    if !request.settled_quantity.is_positive() {
        return Err(LedgerError::invalid_input("settled quantity must be greater than zero"));
    }
    if request.settled_quantity > order.quantity {
        return Err(LedgerError::invalid_input(format!(
            "settled quantity {} exceeds ordered quantity {}",
            request.settled_quantity, order.quantity
        )));
    }
    validate_cash_amount(request.settled_amount)?;
    let trade = request.trade_date.or(order.trade_date);
    let settle = request.settlement_date.or(order.settlement_date);
    if let (Some(trade), Some(settle)) = (trade, settle) {
        if trade > settle {
            return Err(LedgerError::invalid_input("trade date is after settlement date"));
        }
    }
    Ok(())
}

/// Cash movements must be positive and expressed in whole cents.
pub fn validate_cash_amount(amount: Decimal) -> Result<(), LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::invalid_input("amount must be greater than zero"));
    }
    if !is_money(amount) {
        return Err(LedgerError::invalid_input(format!(
            "amount {} has more than two decimal places",
            amount
        )));
    }
    Ok(())
}
