//! Error taxonomy for the settlement core
//!
//! Every fallible ledger operation returns [`LedgerError`]. Variants carry
//! rendered strings so the error stays `Clone + PartialEq` and can cross
//! thread and process boundaries unchanged.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Invalid state transition for order {order_id}: {from} -> {to}")]
    InvalidStateTransition {
        order_id: String,
        from: String,
        to: String,
    },

    #[error("Insufficient funds on account {account_id}: required {required}, available {available}")]
    InsufficientFunds {
        account_id: String,
        required: String,
        available: String,
    },

    #[error(
        "Insufficient holdings on account {account_id} for asset {asset_id}: required {required}, available {available}"
    )]
    InsufficientHoldings {
        account_id: String,
        asset_id: String,
        required: String,
        available: String,
    },

    #[error("Ledger posting failed: {reason}")]
    LedgerPostingFailed { reason: String },

    #[error("Account not found: {account_id}")]
    AccountNotFound { account_id: String },

    #[error("No active reservation for order {order_id}")]
    ReservationNotFound { order_id: String },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("Asset not found: {asset_id}")]
    AssetNotFound { asset_id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn posting_failed(reason: impl Into<String>) -> Self {
        LedgerError::LedgerPostingFailed {
            reason: reason.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        LedgerError::InvalidInput(message.into())
    }

    /// Stable machine-readable code, used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            LedgerError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            LedgerError::InsufficientHoldings { .. } => "INSUFFICIENT_HOLDINGS",
            LedgerError::LedgerPostingFailed { .. } => "LEDGER_POSTING_FAILED",
            LedgerError::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            LedgerError::ReservationNotFound { .. } => "RESERVATION_NOT_FOUND",
            LedgerError::OrderNotFound { .. } => "ORDER_NOT_FOUND",
            LedgerError::AssetNotFound { .. } => "ASSET_NOT_FOUND",
            LedgerError::InvalidInput(_) => "INVALID_INPUT",
            LedgerError::Storage(_) => "STORAGE_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LedgerError::AccountNotFound { .. }
                | LedgerError::ReservationNotFound { .. }
                | LedgerError::OrderNotFound { .. }
                | LedgerError::AssetNotFound { .. }
        )
    }
}
