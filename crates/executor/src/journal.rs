//! The Transaction Log: the append-only history of executed trades.
//!
//! Entries are never updated or deleted. Recency order is id order, highest first.

use crate::error::TradeError;
use crate::store::{LedgerStore, LedgerUnit};
use core_types::{NewTransaction, TradeSide, Transaction, TransactionId};
use futures::stream::{BoxStream, StreamExt};
use rust_decimal::Decimal;
use uuid::Uuid;

/// Appends `entry` inside `unit` and returns the stored entry.
///
/// The entry must belong to the unit's account, carry a non-negative total, and
/// follow the sign convention: positive quantity for buys, negative for sells.
pub async fn append(
    unit: &mut dyn LedgerUnit,
    entry: NewTransaction,
) -> Result<Transaction, TradeError> {
    if entry.user_id != unit.account_id() {
        return Err(TradeError::InvalidOrder(format!(
            "log entry for {} written on account {}",
            entry.user_id,
            unit.account_id()
        )));
    }
    if entry.total_amount.is_sign_negative() {
        return Err(TradeError::InvalidAmount(entry.total_amount));
    }
    let signed_correctly = match entry.side {
        TradeSide::Buy => entry.quantity > Decimal::ZERO,
        TradeSide::Sell => entry.quantity < Decimal::ZERO,
    };
    if !signed_correctly {
        return Err(TradeError::InvalidOrder(format!(
            "{} entry with quantity {}",
            entry.side, entry.quantity
        )));
    }

    Ok(unit.insert_transaction(&entry).await?)
}

/// The user's entries, most recent first. Each call re-reads the log.
pub fn query(
    store: &dyn LedgerStore,
    user_id: Uuid,
) -> BoxStream<'_, Result<Transaction, TradeError>> {
    store
        .transactions(user_id)
        .map(|entry| entry.map_err(TradeError::from))
        .boxed()
}

pub async fn get(store: &dyn LedgerStore, id: TransactionId) -> Result<Transaction, TradeError> {
    store
        .transaction(id)
        .await?
        .ok_or(TradeError::TransactionNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use chrono::{TimeZone, Utc};
    use core_types::Symbol;
    use futures::TryStreamExt;
    use rust_decimal_macros::dec;

    fn entry(user_id: Uuid, side: TradeSide, quantity: Decimal) -> NewTransaction {
        NewTransaction {
            user_id,
            symbol: Symbol::parse("aapl").unwrap(),
            quantity,
            total_amount: quantity.abs() * dec!(10),
            side,
            created_at: None,
        }
    }

    async fn store_with_account() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        store.open_account(id, dec!(0)).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn append_assigns_increasing_ids_and_timestamps() {
        let (store, id) = store_with_account().await;

        let mut unit = store.begin(id).await.unwrap();
        let first = append(unit.as_mut(), entry(id, TradeSide::Buy, dec!(5))).await.unwrap();
        let second = append(unit.as_mut(), entry(id, TradeSide::Sell, dec!(-2))).await.unwrap();
        unit.commit().await.unwrap();

        assert!(second.id > first.id);
        assert!(second.created_at >= first.created_at);
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(second.quantity, dec!(-2));
        assert_eq!(get(&store, first.id).await.unwrap(), first);
    }

    #[tokio::test]
    async fn keeps_a_supplied_timestamp() {
        let (store, id) = store_with_account().await;
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 14, 30, 0).unwrap();

        let mut unit = store.begin(id).await.unwrap();
        let mut new = entry(id, TradeSide::Buy, dec!(1));
        new.created_at = Some(at);
        let written = append(unit.as_mut(), new).await.unwrap();

        assert_eq!(written.created_at, at);
    }

    #[tokio::test]
    async fn rejects_entries_that_break_the_sign_convention() {
        let (store, id) = store_with_account().await;

        let mut unit = store.begin(id).await.unwrap();
        assert!(matches!(
            append(unit.as_mut(), entry(id, TradeSide::Sell, dec!(3))).await,
            Err(TradeError::InvalidOrder(_))
        ));
        assert!(matches!(
            append(unit.as_mut(), entry(id, TradeSide::Buy, dec!(-3))).await,
            Err(TradeError::InvalidOrder(_))
        ));
        assert!(matches!(
            append(unit.as_mut(), entry(Uuid::new_v4(), TradeSide::Buy, dec!(3))).await,
            Err(TradeError::InvalidOrder(_))
        ));
    }

    #[tokio::test]
    async fn query_is_newest_first_and_rereads_the_log() {
        let (store, id) = store_with_account().await;

        let mut unit = store.begin(id).await.unwrap();
        append(unit.as_mut(), entry(id, TradeSide::Buy, dec!(1))).await.unwrap();
        append(unit.as_mut(), entry(id, TradeSide::Buy, dec!(2))).await.unwrap();
        unit.commit().await.unwrap();

        let listed: Vec<Transaction> = query(&store, id).try_collect().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].id > listed[1].id);

        let mut unit = store.begin(id).await.unwrap();
        append(unit.as_mut(), entry(id, TradeSide::Sell, dec!(-1))).await.unwrap();
        unit.commit().await.unwrap();

        let relisted: Vec<Transaction> = query(&store, id).try_collect().await.unwrap();
        assert_eq!(relisted.len(), 3);
        assert_eq!(relisted[0].side, TradeSide::Sell);
    }

    #[tokio::test]
    async fn uncommitted_entries_are_never_visible() {
        let (store, id) = store_with_account().await;

        let written = {
            let mut unit = store.begin(id).await.unwrap();
            append(unit.as_mut(), entry(id, TradeSide::Buy, dec!(1))).await.unwrap()
        };

        let listed: Vec<Transaction> = query(&store, id).try_collect().await.unwrap();
        assert!(listed.is_empty());
        assert!(matches!(
            get(&store, written.id).await,
            Err(TradeError::TransactionNotFound(missing)) if missing == written.id
        ));
    }
}
