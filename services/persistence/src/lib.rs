//! Ledger Store: durable balances, holdings, orders and ledger rows
//!
//! Provides atomic units of work over the ledger, an append-only commit
//! journal with CRC32C checksums, and crash recovery by journal replay.
//!
//! # Modules
//! - `store`: the `LedgerStore` / `LedgerTx` interface used by the engine
//! - `unit`: staged writes for one unit of work
//! - `state`: committed rows and change sets
//! - `db`: the journaled in-process store
//! - `journal`, `reader`, `recovery`: write-ahead log and replay

pub mod db;
pub mod journal;
pub mod reader;
pub mod recovery;
pub mod state;
pub mod store;
pub mod unit;

pub use db::LedgerDb;
pub use journal::JournalConfig;
pub use store::{LedgerStore, LedgerTx};
