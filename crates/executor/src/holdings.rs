//! The Holdings Aggregate: net shares per `(user, symbol)`.
//!
//! A holding row exists only while its share count is positive. The first buy
//! creates it and the sell that brings it to zero deletes it.

use crate::error::TradeError;
use crate::store::{LedgerStore, LedgerUnit};
use core_types::{Holding, Symbol};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Adds `quantity` shares, creating the row if needed. Returns the new share count.
pub async fn increase(
    unit: &mut dyn LedgerUnit,
    symbol: &Symbol,
    quantity: Decimal,
) -> Result<Decimal, TradeError> {
    if quantity <= Decimal::ZERO {
        return Err(TradeError::InvalidAmount(quantity));
    }

    let current = unit.shares(symbol).await?.unwrap_or(Decimal::ZERO);
    let shares = current
        .checked_add(quantity)
        .ok_or(TradeError::InvalidAmount(quantity))?;
    unit.put_holding(symbol, shares).await?;
    Ok(shares)
}

/// Removes `quantity` shares, deleting the row when it reaches zero.
/// Returns the remaining share count (zero when the row was deleted).
pub async fn decrease(
    unit: &mut dyn LedgerUnit,
    symbol: &Symbol,
    quantity: Decimal,
) -> Result<Decimal, TradeError> {
    if quantity <= Decimal::ZERO {
        return Err(TradeError::InvalidAmount(quantity));
    }

    let available = unit.shares(symbol).await?.unwrap_or(Decimal::ZERO);
    if available < quantity {
        return Err(TradeError::InsufficientShares {
            symbol: symbol.to_string(),
            requested: quantity,
            available,
        });
    }

    let remaining = available - quantity;
    if remaining.is_zero() {
        unit.delete_holding(symbol).await?;
    } else {
        unit.put_holding(symbol, remaining).await?;
    }
    Ok(remaining)
}

/// Committed share count, zero when the user holds none.
pub async fn get(
    store: &dyn LedgerStore,
    user_id: Uuid,
    symbol: &Symbol,
) -> Result<Decimal, TradeError> {
    Ok(store.shares(user_id, symbol).await?.unwrap_or(Decimal::ZERO))
}

/// Every holding of the user, ordered by symbol.
pub async fn list(store: &dyn LedgerStore, user_id: Uuid) -> Result<Vec<Holding>, TradeError> {
    Ok(store.holdings(user_id).await?)
}
