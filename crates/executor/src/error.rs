use core_types::{CoreError, TransactionId};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Failures raised by a persistence backend behind the `LedgerStore` seam.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Account already exists: {0}")]
    AccountExists(Uuid),

    #[error("Storage backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

/// The rejection reasons a trade or a ledger operation can produce.
#[derive(Error, Debug)]
pub enum TradeError {
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Insufficient balance. Required: {required}, Available: {available}")]
    InsufficientFunds { required: Decimal, available: Decimal },

    #[error("Insufficient stock quantity for {symbol}. Requested: {requested}, Available: {available}")]
    InsufficientShares {
        symbol: String,
        requested: Decimal,
        available: Decimal,
    },

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Storage failure: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for TradeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(id) => TradeError::AccountNotFound(id),
            other => TradeError::Storage(other),
        }
    }
}

impl From<CoreError> for TradeError {
    fn from(err: CoreError) -> Self {
        TradeError::InvalidOrder(err.to_string())
    }
}
