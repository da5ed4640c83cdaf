use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use types::asset::AssetType;
use types::ids::{AccountId, AssetId, OrderNumber, UserId};
use types::numeric::{Price, Quantity};
use types::order::{NewOrder, SettlementRequest};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub account_id: AccountId,
    pub asset_id: AssetId,
    pub quantity: Quantity,
    pub price_per_unit: Price,
    pub currency: String,
    #[serde(default)]
    pub trade_date: Option<NaiveDate>,
    #[serde(default)]
    pub settlement_date: Option<NaiveDate>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_new_order(self, owner_id: UserId) -> NewOrder {
        NewOrder {
            account_id: self.account_id,
            asset_id: self.asset_id,
            quantity: self.quantity,
            price_per_unit: self.price_per_unit,
            currency: self.currency,
            trade_date: self.trade_date,
            settlement_date: self.settlement_date,
            owner_id,
            comment: self.comment,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettleOrderRequest {
    pub settled_quantity: Quantity,
    pub settled_amount: Decimal,
    #[serde(default)]
    pub trade_date: Option<NaiveDate>,
    #[serde(default)]
    pub settlement_date: Option<NaiveDate>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl SettleOrderRequest {
    pub fn into_settlement(self, settled_by: UserId) -> SettlementRequest {
        SettlementRequest {
            settled_quantity: self.settled_quantity,
            settled_amount: self.settled_amount,
            trade_date: self.trade_date,
            settlement_date: self.settlement_date,
            comment: self.comment,
            settled_by,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccountRequest {
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CashMovementRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReverseRequest {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingResponse {
    pub order_number: OrderNumber,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseResponse {
    pub released: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterAssetRequest {
    pub symbol: String,
    pub asset_type: AssetType,
    pub currency: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedInventoryRequest {
    pub quantity: Quantity,
}
