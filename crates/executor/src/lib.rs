//! # Folio Executor Crate
//!
//! The ledger core of the portfolio tracker. A trade touches three views of the
//! same economic fact and this crate keeps them in step:
//!
//! - [`ledger`]: the account's cash balance (never negative).
//! - [`holdings`]: shares per symbol (a row exists only while shares are positive).
//! - [`journal`]: the append-only transaction log.
//!
//! [`TradeExecutor`] validates an order, then writes log, ledger, and holdings,
//! in that order, inside one [`LedgerUnit`]. The unit holds the account's lock
//! and commits all three writes or none of them.
//!
//! ## Public API
//!
//! - `LedgerStore` / `LedgerUnit`: the persistence seam. `InMemoryStore` is the
//!   process-local implementation; the `database` crate provides PostgreSQL.
//! - `TradeExecutor`: buy, sell, and the read operations used by the web layer.
//! - `reconcile`: replays the log and reports drift in the stored aggregates.
//! - `TradeError` / `StoreError`: the specific error types of this crate.

// Declare the modules that constitute this crate.
pub mod error;
pub mod holdings;
pub mod journal;
pub mod ledger;
pub mod memory;
pub mod reconcile;
pub mod store;
pub mod trade;

// Re-export the key components to provide a clean, public-facing API.
pub use error::{StoreError, TradeError};
pub use memory::InMemoryStore;
pub use reconcile::{Discrepancy, ReconciliationReport, reconcile};
pub use store::{LedgerStore, LedgerUnit};
pub use trade::TradeExecutor;
