use crate::error::StoreError;
use async_trait::async_trait;
use core_types::{Account, Holding, NewTransaction, Symbol, Transaction, TransactionId};
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use uuid::Uuid;

/// The persistence handle the ledger components are given explicitly.
///
/// Writes only happen through a [`LedgerUnit`] obtained from [`LedgerStore::begin`].
/// The read methods here see committed state only.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Opens a unit of work on one account and takes that account's exclusive lock.
    ///
    /// The lock is held until the unit is committed or dropped. Fails with
    /// `AccountNotFound` when the account does not exist.
    async fn begin(&self, account_id: Uuid) -> Result<Box<dyn LedgerUnit>, StoreError>;

    /// Creates an account with `opening_balance` as both its balance and its replay origin.
    async fn open_account(
        &self,
        account_id: Uuid,
        opening_balance: Decimal,
    ) -> Result<Account, StoreError>;

    async fn account(&self, account_id: Uuid) -> Result<Account, StoreError>;

    /// Current share count, or `None` when no holding row exists.
    async fn shares(&self, user_id: Uuid, symbol: &Symbol) -> Result<Option<Decimal>, StoreError>;

    /// All holdings of a user, ordered by symbol.
    async fn holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, StoreError>;

    /// The user's log entries, newest (highest id) first. Every call reads afresh.
    fn transactions(&self, user_id: Uuid) -> BoxStream<'_, Result<Transaction, StoreError>>;

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError>;
}

/// A single all-or-nothing unit of ledger writes on one account.
///
/// Reads inside a unit observe the unit's own pending writes. Nothing is
/// visible to other callers until [`LedgerUnit::commit`] succeeds, and dropping
/// a unit without committing discards every write it made.
#[async_trait]
pub trait LedgerUnit: Send {
    fn account_id(&self) -> Uuid;

    async fn balance(&mut self) -> Result<Decimal, StoreError>;

    async fn set_balance(&mut self, balance: Decimal) -> Result<(), StoreError>;

    async fn shares(&mut self, symbol: &Symbol) -> Result<Option<Decimal>, StoreError>;

    /// Creates or replaces the holding row for `symbol`. `shares` is always positive.
    async fn put_holding(&mut self, symbol: &Symbol, shares: Decimal) -> Result<(), StoreError>;

    async fn delete_holding(&mut self, symbol: &Symbol) -> Result<(), StoreError>;

    /// Writes a log entry and returns it with its assigned id and timestamp.
    async fn insert_transaction(
        &mut self,
        entry: &NewTransaction,
    ) -> Result<Transaction, StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
