pub mod account;
pub mod asset;
pub mod ledger;
pub mod order;
