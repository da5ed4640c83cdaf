//! Order lifecycle types
//!
//! Lifecycle: `created -> confirmed -> executed -> settled`, with
//! `canceled` reachable from `created` and `confirmed`. The status field is
//! the single source of truth for which operations are legal.

use crate::errors::LedgerError;
use crate::ids::{AccountId, AssetId, OrderId, OrderNumber, UserId};
use crate::numeric::{notional, Price, Quantity};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Created,
    Confirmed,
    Executed,
    Settled,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "created",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Executed => "executed",
            OrderStatus::Settled => "settled",
            OrderStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Settled | OrderStatus::Canceled)
    }

    /// Open orders still hold their reservation and may be canceled
    pub fn is_cancelable(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::Confirmed)
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Created, Confirmed)
                | (Created, Canceled)
                | (Confirmed, Executed)
                | (Confirmed, Canceled)
                | (Executed, Settled)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied order intent. The side is chosen by the entry point
/// (`CreateBuyOrder` / `CreateSellOrder`), the total amount is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub quantity: Quantity,
    pub price_per_unit: Price,
    pub currency: String,
    pub trade_date: Option<NaiveDate>,
    pub settlement_date: Option<NaiveDate>,
    pub owner_id: UserId,
    pub comment: Option<String>,
}

/// Settlement instruction for an executed order. The settled quantity and
/// amount may differ from what was ordered (partial fills).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementRequest {
    pub settled_quantity: Quantity,
    pub settled_amount: Decimal,
    pub trade_date: Option<NaiveDate>,
    pub settlement_date: Option<NaiveDate>,
    pub comment: Option<String>,
    pub settled_by: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub side: Side,
    pub quantity: Quantity,
    pub price_per_unit: Price,
    /// `quantity * price_per_unit`, rounded to money scale
    pub total_amount: Decimal,
    pub currency: String,
    pub trade_date: Option<NaiveDate>,
    pub settlement_date: Option<NaiveDate>,
    pub order_number: OrderNumber,
    /// Number shared by the ledger entries posted at settlement
    pub settlement_order_number: Option<OrderNumber>,
    pub status: OrderStatus,
    pub settled_quantity: Option<Quantity>,
    pub settled_amount: Option<Decimal>,
    pub owner_id: UserId,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl Order {
    pub fn create(
        request: NewOrder,
        side: Side,
        order_number: OrderNumber,
        now: DateTime<Utc>,
    ) -> Result<Self, LedgerError> {
        let total_amount = notional(request.quantity, request.price_per_unit)?;
        Ok(Self {
            order_id: OrderId::new(),
            account_id: request.account_id,
            asset_id: request.asset_id,
            side,
            quantity: request.quantity,
            price_per_unit: request.price_per_unit,
            total_amount,
            currency: request.currency,
            trade_date: request.trade_date,
            settlement_date: request.settlement_date,
            order_number,
            settlement_order_number: None,
            status: OrderStatus::Created,
            settled_quantity: None,
            settled_amount: None,
            owner_id: request.owner_id,
            comment: request.comment,
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    pub fn invalid_transition(&self, to: OrderStatus) -> LedgerError {
        LedgerError::InvalidStateTransition {
            order_id: self.order_id.to_string(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    /// Move to `next`, rejecting anything not in the lifecycle table.
    pub fn transition(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), LedgerError> {
        if !self.status.can_transition_to(next) {
            return Err(self.invalid_transition(next));
        }
        self.status = next;
        self.updated_at = now;
        self.version += 1;
        Ok(())
    }

    /// Record the settlement outcome and move to `settled`.
    pub fn record_settlement(
        &mut self,
        request: &SettlementRequest,
        settlement_order_number: OrderNumber,
        now: DateTime<Utc>,
    ) -> Result<(), LedgerError> {
        self.transition(OrderStatus::Settled, now)?;
        self.settled_quantity = Some(request.settled_quantity);
        self.settled_amount = Some(request.settled_amount);
        self.settlement_order_number = Some(settlement_order_number);
        if request.trade_date.is_some() {
            self.trade_date = request.trade_date;
        }
        if request.settlement_date.is_some() {
            self.settlement_date = request.settlement_date;
        }
        if request.comment.is_some() {
            self.comment = request.comment.clone();
        }
        Ok(())
    }
}
