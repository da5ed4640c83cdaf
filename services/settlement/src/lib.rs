//! Settlement Engine: order lifecycle, reservations and ledger posting
//!
//! # Modules
//! - `coordinator`: top-level operations, one unit of work each
//! - `state_machine`: lifecycle transitions and feasibility guards
//! - `reservation`: cash and asset holds per order
//! - `poster`: mirrored ledger pairs, deposits, withdrawals, reversals
//! - `sweeper`: cancellation of open orders with expired holds
//! - `validator`: input checks
//! - `config`: engine settings

pub mod config;
pub mod coordinator;
pub mod poster;
pub mod reservation;
pub mod state_machine;
pub mod sweeper;
pub mod validator;

pub use config::SettlementConfig;
pub use coordinator::SettlementCoordinator;
pub use sweeper::ReservationSweeper;
