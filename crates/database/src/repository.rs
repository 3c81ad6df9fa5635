use crate::error::{DbError, is_unique_violation};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_types::{Account, Holding, NewTransaction, Symbol, Transaction, TransactionId};
use executor::{LedgerStore, LedgerUnit, StoreError};
use futures::stream::{BoxStream, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, Postgres};
use sqlx::{FromRow, Transaction as SqlTransaction};
use uuid::Uuid;

/// The `DbRepository` provides a high-level, application-specific interface
/// to the database. It encapsulates all SQL queries and data access logic, and
/// is the PostgreSQL implementation of the ledger's `LedgerStore`.
#[derive(Debug, Clone)]
pub struct DbRepository {
    pool: PgPool,
}

/// Represents a row from the `users` table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DbUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl DbRepository {
    /// Creates a new `DbRepository` with a shared database connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a user and opens their cash account in one database transaction.
    ///
    /// A duplicate email is reported as `DbError::Conflict`.
    pub async fn register_user(
        &self,
        id: Uuid,
        username: &str,
        email: &str,
        password_hash: &str,
        opening_balance: Decimal,
    ) -> Result<DbUser, DbError> {
        let mut tx = self.pool.begin().await?;

        let user = sqlx::query_as::<_, DbUser>(
            r#"
            INSERT INTO users (id, username, email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&mut *tx) // Note: must use the transaction object `tx` here
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict(format!("email {email} is already registered"))
            } else {
                e.into()
            }
        })?;

        sqlx::query("INSERT INTO accounts (id, balance, opening_balance) VALUES ($1, $2, $2)")
            .bind(id)
            .bind(opening_balance)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user)
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<DbUser>, DbError> {
        let user = sqlx::query_as::<_, DbUser>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<DbUser, DbError> {
        sqlx::query_as::<_, DbUser>(
            "SELECT id, username, email, password_hash, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| if let sqlx::Error::RowNotFound = e { DbError::NotFound } else { e.into() })
    }

    /// Replaces a user's username and email, and the password digest when one is given.
    ///
    /// A duplicate email is reported as `DbError::Conflict`, a missing user as `DbError::NotFound`.
    pub async fn update_user(
        &self,
        id: Uuid,
        username: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<DbUser, DbError> {
        sqlx::query_as::<_, DbUser>(
            r#"
            UPDATE users
            SET username = $2, email = $3, password_hash = COALESCE($4, password_hash)
            WHERE id = $1
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(id)
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DbError::Conflict(format!("email {email} is already registered"))
            } else {
                e.into()
            }
        })?
        .ok_or(DbError::NotFound)
    }

    /// All account ids, for audits that sweep every user.
    pub async fn account_ids(&self) -> Result<Vec<Uuid>, DbError> {
        let ids = sqlx::query_scalar::<_, Uuid>("SELECT id FROM accounts ORDER BY created_at ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids)
    }
}

#[async_trait]
impl LedgerStore for DbRepository {
    async fn begin(&self, account_id: Uuid) -> Result<Box<dyn LedgerUnit>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // The row lock is the per-account exclusion; it is released on commit or rollback.
        let locked = sqlx::query_scalar::<_, Uuid>("SELECT id FROM accounts WHERE id = $1 FOR UPDATE")
            .bind(account_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StoreError::backend)?;
        if locked.is_none() {
            return Err(StoreError::AccountNotFound(account_id));
        }

        Ok(Box::new(PgUnit { tx, account_id }))
    }

    async fn open_account(
        &self,
        account_id: Uuid,
        opening_balance: Decimal,
    ) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, balance, opening_balance)
            VALUES ($1, $2, $2)
            RETURNING id, balance, opening_balance
            "#,
        )
        .bind(account_id)
        .bind(opening_balance)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::AccountExists(account_id)
            } else {
                StoreError::backend(e)
            }
        })
    }

    async fn account(&self, account_id: Uuid) -> Result<Account, StoreError> {
        sqlx::query_as::<_, Account>(
            "SELECT id, balance, opening_balance FROM accounts WHERE id = $1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?
        .ok_or(StoreError::AccountNotFound(account_id))
    }

    async fn shares(&self, user_id: Uuid, symbol: &Symbol) -> Result<Option<Decimal>, StoreError> {
        sqlx::query_scalar::<_, Decimal>(
            "SELECT shares FROM holdings WHERE user_id = $1 AND symbol = $2",
        )
        .bind(user_id)
        .bind(symbol.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)
    }

    async fn holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, StoreError> {
        sqlx::query_as::<_, Holding>(
            "SELECT symbol, shares FROM holdings WHERE user_id = $1 ORDER BY symbol ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)
    }

    fn transactions(&self, user_id: Uuid) -> BoxStream<'_, Result<Transaction, StoreError>> {
        sqlx::query_as::<_, Transaction>(
            "SELECT id, user_id, symbol, quantity, total_amount, side, created_at \
             FROM transactions WHERE user_id = $1 ORDER BY id DESC",
        )
        .bind(user_id)
        .fetch(&self.pool)
        .map(|row| row.map_err(StoreError::backend))
        .boxed()
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, StoreError> {
        sqlx::query_as::<_, Transaction>(
            "SELECT id, user_id, symbol, quantity, total_amount, side, created_at \
             FROM transactions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)
    }
}

/// A ledger unit backed by one PostgreSQL transaction holding the account row lock.
/// Dropping it without `commit` rolls the transaction back.
struct PgUnit {
    tx: SqlTransaction<'static, Postgres>,
    account_id: Uuid,
}

#[async_trait]
impl LedgerUnit for PgUnit {
    fn account_id(&self) -> Uuid {
        self.account_id
    }

    async fn balance(&mut self) -> Result<Decimal, StoreError> {
        sqlx::query_scalar::<_, Decimal>("SELECT balance FROM accounts WHERE id = $1")
            .bind(self.account_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(StoreError::backend)
    }

    async fn set_balance(&mut self, balance: Decimal) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET balance = $1 WHERE id = $2")
            .bind(balance)
            .bind(self.account_id)
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn shares(&mut self, symbol: &Symbol) -> Result<Option<Decimal>, StoreError> {
        sqlx::query_scalar::<_, Decimal>(
            "SELECT shares FROM holdings WHERE user_id = $1 AND symbol = $2",
        )
        .bind(self.account_id)
        .bind(symbol.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::backend)
    }

    async fn put_holding(&mut self, symbol: &Symbol, shares: Decimal) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO holdings (user_id, symbol, shares) VALUES ($1, $2, $3)
            ON CONFLICT (user_id, symbol) DO UPDATE SET shares = EXCLUDED.shares
            "#,
        )
        .bind(self.account_id)
        .bind(symbol.as_str())
        .bind(shares)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn delete_holding(&mut self, symbol: &Symbol) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM holdings WHERE user_id = $1 AND symbol = $2")
            .bind(self.account_id)
            .bind(symbol.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn insert_transaction(
        &mut self,
        entry: &NewTransaction,
    ) -> Result<Transaction, StoreError> {
        sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (user_id, symbol, quantity, total_amount, side, created_at)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()))
            RETURNING id, user_id, symbol, quantity, total_amount, side, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.symbol.as_str())
        .bind(entry.quantity)
        .bind(entry.total_amount)
        .bind(entry.side)
        .bind(entry.created_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::backend)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(StoreError::backend)
    }
}
