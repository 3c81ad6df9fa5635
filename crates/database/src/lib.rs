//! # Folio Database Crate
//!
//! This crate acts as a high-level, application-specific interface to the
//! PostgreSQL database. It is the system's permanent ledger.
//!
//! ## Architectural Principles
//!
//! - **Adapter:** All SQL lives here. The rest of the application talks to the
//!   ledger through the executor's `LedgerStore` trait, which `DbRepository`
//!   implements.
//! - **One transaction per trade:** `LedgerStore::begin` opens a database
//!   transaction and locks the account row with `SELECT ... FOR UPDATE`, so a
//!   trade's log, balance, and holdings writes commit together or not at all.
//! - **Asynchronous & Pooled:** All operations are asynchronous, and it uses a
//!   connection pool (`PgPool`) for concurrent database access.
//!
//! ## Public API
//!
//! - `connect`: The async function to establish the database connection pool.
//! - `run_migrations`: Applies the embedded migrations.
//! - `DbRepository`: The ledger store plus the user directory queries used by auth.
//! - `DbError`: The specific error types that can be returned from this crate.

// Declare the modules that constitute this crate.
pub mod connection;
pub mod error;
pub mod repository;

// Re-export the key components to create a clean, public-facing API.
pub use connection::{connect, run_migrations};
pub use error::DbError;
pub use repository::{DbRepository, DbUser};
