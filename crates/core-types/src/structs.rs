use crate::enums::TradeSide;
use crate::symbol::Symbol;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Identifier of a transaction log entry. Monotonic in creation order.
pub type TransactionId = i64;

/// A user's cash account. `id` is the owning user's id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Account {
    pub id: Uuid,
    pub balance: Decimal,
    /// The balance the account was opened with; the starting point for log replay.
    pub opening_balance: Decimal,
}

/// The net number of shares a user owns in one symbol. Never zero or negative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Holding {
    pub symbol: String,
    pub shares: Decimal,
}

/// An executed trade, as recorded in the append-only transaction log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Transaction {
    pub id: TransactionId,
    pub user_id: Uuid,
    pub symbol: String,
    /// Signed: positive for buys, negative for sells.
    pub quantity: Decimal,
    pub total_amount: Decimal,
    #[serde(rename = "type")]
    pub side: TradeSide,
    #[serde(rename = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// A log entry that has not been written yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub user_id: Uuid,
    pub symbol: Symbol,
    pub quantity: Decimal,
    pub total_amount: Decimal,
    pub side: TradeSide,
    /// Filled in with the current time by the log when absent.
    pub created_at: Option<DateTime<Utc>>,
}

/// A buy or sell request as received from the caller. The side is passed separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub user_id: Uuid,
    /// Raw symbol; normalized by the executor.
    pub symbol: String,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
}

/// The receipt returned once all three ledger writes have been committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeConfirmation {
    pub transaction_id: TransactionId,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: Decimal,
    pub total_amount: Decimal,
    pub new_balance: Decimal,
    pub new_holding_shares: Decimal,
    pub executed_at: DateTime<Utc>,
}
