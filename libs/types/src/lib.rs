//! Types library for the brokerage ledger
//!
//! Core type definitions shared by the ledger store, the settlement engine
//! and the API gateway. No I/O lives here.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, AccountId, AssetId, ...) and order numbers
//! - `numeric`: Fixed-point decimal types (Price, Quantity) and money rounding
//! - `account`: Accounts and cash balances
//! - `holding`: Instrument holdings
//! - `asset`: Tradable instruments
//! - `order`: Order lifecycle types
//! - `reservation`: Cash and asset holds
//! - `transaction`: Ledger entries and posting pairs
//! - `errors`: Error taxonomy

pub mod account;
pub mod asset;
pub mod errors;
pub mod holding;
pub mod ids;
pub mod numeric;
pub mod order;
pub mod reservation;
pub mod transaction;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::account::*;
    pub use crate::asset::*;
    pub use crate::errors::*;
    pub use crate::holding::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::reservation::*;
    pub use crate::transaction::*;
}
