use crate::error::StoreError;
use crate::store::{LedgerStore, LedgerUnit};
use async_trait::async_trait;
use chrono::Utc;
use core_types::{Account, Holding, NewTransaction, Symbol, Transaction, TransactionId};
use futures::stream::{self, BoxStream, StreamExt};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// Everything the ledger knows about one account.
#[derive(Debug, Clone)]
struct Book {
    account: Account,
    holdings: BTreeMap<String, Decimal>,
    /// Ascending id order.
    journal: Vec<Transaction>,
}

/// A process-local `LedgerStore`.
///
/// Each account's book sits behind its own async mutex, which is the
/// per-account lock a [`LedgerUnit`] holds. Units write to a private copy of
/// the book that replaces the original on commit.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    books: RwLock<HashMap<Uuid, Arc<Mutex<Book>>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn book(&self, account_id: Uuid) -> Option<Arc<Mutex<Book>>> {
        self.books.read().await.get(&account_id).cloned()
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn begin(&self, account_id: Uuid) -> Result<Box<dyn LedgerUnit>, StoreError> {
        let book = self
            .book(account_id)
            .await
            .ok_or(StoreError::AccountNotFound(account_id))?;
        let guard = book.lock_owned().await;
        let staged = guard.clone();

        Ok(Box::new(MemoryUnit {
            guard,
            staged,
            next_id: Arc::clone(&self.next_id),
        }))
    }

    async fn open_account(
        &self,
        account_id: Uuid,
        opening_balance: Decimal,
    ) -> Result<Account, StoreError> {
        let mut books = self.books.write().await;
        if books.contains_key(&account_id) {
            return Err(StoreError::AccountExists(account_id));
        }

        let account = Account {
            id: account_id,
            balance: opening_balance,
            opening_balance,
        };
        books.insert(
            account_id,
            Arc::new(Mutex::new(Book {
                account: account.clone(),
                holdings: BTreeMap::new(),
                journal: Vec::new(),
            })),
        );
        Ok(account)
    }

    async fn account(&self, account_id: Uuid) -> Result<Account, StoreError> {
        let book = self
            .book(account_id)
            .await
            .ok_or(StoreError::AccountNotFound(account_id))?;
        let account = book.lock().await.account.clone();
        Ok(account)
    }

    async fn shares(&self, user_id: Uuid, symbol: &Symbol) -> Result<Option<Decimal>, StoreError> {
        let Some(book) = self.book(user_id).await else {
            return Ok(None);
        };
        let shares = book.lock().await.holdings.get(symbol.as_str()).copied();
        Ok(shares)
    }

    async fn holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, StoreError> {
        let Some(book) = self.book(user_id).await else {
            return Ok(Vec::new());
        };
        let holdings = book
            .lock()
            .await
            .holdings
            .iter()
            .map(|(symbol, shares)| Holding {
                symbol: symbol.clone(),
                shares: *shares,
            })
            .collect();
        Ok(holdings)
    }

    fn transactions(&self, user_id: Uuid) -> BoxStream<'_, Result<Transaction, StoreError>> {
        let snapshot = async move {
            let entries: Vec<Transaction> = match self.book(user_id).await {
                Some(book) => book.lock().await.journal.iter().rev().cloned().collect(),
                None => Vec::new(),
            };
            stream::iter(entries.into_iter().map(Ok))
        };
        stream::once(snapshot).flatten().boxed()
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        let books: Vec<_> = self.books.read().await.values().cloned().collect();
        for book in books {
            let book = book.lock().await;
            if let Ok(index) = book.journal.binary_search_by_key(&id, |entry| entry.id) {
                return Ok(Some(book.journal[index].clone()));
            }
        }
        Ok(None)
    }
}

struct MemoryUnit {
    guard: OwnedMutexGuard<Book>,
    staged: Book,
    next_id: Arc<AtomicI64>,
}

#[async_trait]
impl LedgerUnit for MemoryUnit {
    fn account_id(&self) -> Uuid {
        self.staged.account.id
    }

    async fn balance(&mut self) -> Result<Decimal, StoreError> {
        Ok(self.staged.account.balance)
    }

    async fn set_balance(&mut self, balance: Decimal) -> Result<(), StoreError> {
        self.staged.account.balance = balance;
        Ok(())
    }

    async fn shares(&mut self, symbol: &Symbol) -> Result<Option<Decimal>, StoreError> {
        Ok(self.staged.holdings.get(symbol.as_str()).copied())
    }

    async fn put_holding(&mut self, symbol: &Symbol, shares: Decimal) -> Result<(), StoreError> {
        self.staged.holdings.insert(symbol.to_string(), shares);
        Ok(())
    }

    async fn delete_holding(&mut self, symbol: &Symbol) -> Result<(), StoreError> {
        self.staged.holdings.remove(symbol.as_str());
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        entry: &NewTransaction,
    ) -> Result<Transaction, StoreError> {
        let transaction = Transaction {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: entry.user_id,
            symbol: entry.symbol.to_string(),
            quantity: entry.quantity,
            total_amount: entry.total_amount,
            side: entry.side,
            created_at: entry.created_at.unwrap_or_else(Utc::now),
        };
        self.staged.journal.push(transaction.clone());
        Ok(transaction)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryUnit {
            mut guard, staged, ..
        } = *self;
        *guard = staged;
        Ok(())
    }
}
