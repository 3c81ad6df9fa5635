//! Shared data model for the portfolio ledger: accounts, holdings, the
//! transaction log entries, and trade requests/receipts.

pub mod enums;
pub mod error;
pub mod structs;
pub mod symbol;

// Re-export the core types to provide a clean public API.
pub use enums::TradeSide;
pub use error::CoreError;
pub use structs::{
    Account, Holding, NewTransaction, TradeConfirmation, TradeOrder, Transaction, TransactionId,
};
pub use symbol::Symbol;
