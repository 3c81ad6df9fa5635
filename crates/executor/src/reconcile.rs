use crate::error::TradeError;
use crate::store::LedgerStore;
use crate::{holdings, journal};
use core_types::Transaction;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Balance and holdings as implied by the transaction log alone.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayedState {
    pub balance: Decimal,
    pub holdings: BTreeMap<String, Decimal>,
}

/// A point where a stored aggregate disagrees with the replayed log.
#[derive(Debug, Clone, PartialEq)]
pub enum Discrepancy {
    Balance {
        stored: Decimal,
        replayed: Decimal,
    },
    Holding {
        symbol: String,
        stored: Decimal,
        replayed: Decimal,
    },
}

#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub user_id: Uuid,
    pub entries_replayed: usize,
    pub replayed: ReplayedState,
    pub discrepancies: Vec<Discrepancy>,
}

impl ReconciliationReport {
    pub fn is_consistent(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Folds log entries, in id order, on top of `opening_balance`.
///
/// A log whose running totals leave the `Decimal` range is reported as
/// `InvalidAmount` with the entry that overflowed.
pub fn replay(
    opening_balance: Decimal,
    entries: &[Transaction],
) -> Result<ReplayedState, TradeError> {
    let mut ordered: Vec<&Transaction> = entries.iter().collect();
    ordered.sort_by_key(|entry| entry.id);

    let mut balance = opening_balance;
    let mut holdings: BTreeMap<String, Decimal> = BTreeMap::new();

    for entry in ordered {
        // Quantities are signed, so the cash delta is the opposite sign of the share delta.
        let moved = if entry.quantity.is_sign_negative() {
            balance.checked_add(entry.total_amount)
        } else {
            balance.checked_sub(entry.total_amount)
        };
        balance = moved.ok_or(TradeError::InvalidAmount(entry.total_amount))?;

        let shares = holdings.entry(entry.symbol.clone()).or_insert(Decimal::ZERO);
        *shares = shares
            .checked_add(entry.quantity)
            .ok_or(TradeError::InvalidAmount(entry.quantity))?;
    }
    holdings.retain(|_, shares| !shares.is_zero());

    Ok(ReplayedState { balance, holdings })
}

/// The "source of truth" audit: replays a user's log and compares the result
/// with the stored balance and holdings.
///
/// Reads are not taken under the account lock, so a trade landing mid-audit can
/// show up as a transient discrepancy. Run it again before acting on one.
pub async fn reconcile(
    store: &dyn LedgerStore,
    user_id: Uuid,
) -> Result<ReconciliationReport, TradeError> {
    let account = store.account(user_id).await?;
    let entries: Vec<Transaction> = journal::query(store, user_id).try_collect().await?;
    let stored_holdings = holdings::list(store, user_id).await?;

    let replayed = replay(account.opening_balance, &entries)?;
    let mut discrepancies = Vec::new();

    if account.balance != replayed.balance {
        discrepancies.push(Discrepancy::Balance {
            stored: account.balance,
            replayed: replayed.balance,
        });
    }

    let stored: BTreeMap<String, Decimal> = stored_holdings
        .into_iter()
        .map(|holding| (holding.symbol, holding.shares))
        .collect();
    let symbols: std::collections::BTreeSet<&String> =
        stored.keys().chain(replayed.holdings.keys()).collect();
    for symbol in symbols {
        let stored_shares = stored.get(symbol).copied().unwrap_or(Decimal::ZERO);
        let replayed_shares = replayed.holdings.get(symbol).copied().unwrap_or(Decimal::ZERO);
        if stored_shares != replayed_shares {
            discrepancies.push(Discrepancy::Holding {
                symbol: symbol.clone(),
                stored: stored_shares,
                replayed: replayed_shares,
            });
        }
    }

    if !discrepancies.is_empty() {
        tracing::warn!(
            user_id = %user_id,
            count = discrepancies.len(),
            "[RECONCILER] Ledger aggregates disagree with the transaction log."
        );
    }

    Ok(ReconciliationReport {
        user_id,
        entries_replayed: entries.len(),
        replayed,
        discrepancies,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger;
    use crate::memory::InMemoryStore;
    use crate::trade::TradeExecutor;
    use core_types::{Symbol, TradeOrder, TradeSide};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[tokio::test]
    async fn a_clean_history_reconciles() {
        let store = Arc::new(InMemoryStore::new());
        let user = Uuid::new_v4();
        ledger::open(store.as_ref(), user, dec!(5000)).await.unwrap();
        let executor = TradeExecutor::new(store.clone());

        for (symbol, qty, price, buy) in [
            ("aapl", dec!(10), dec!(150), true),
            ("msft", dec!(2), dec!(300), true),
            ("aapl", dec!(4), dec!(155), false),
            ("msft", dec!(2), dec!(310), false),
        ] {
            let order = TradeOrder {
                user_id: user,
                symbol: symbol.to_string(),
                quantity: qty,
                price_per_unit: price,
            };
            if buy {
                executor.buy(&order).await.unwrap();
            } else {
                executor.sell(&order).await.unwrap();
            }
        }

        let report = reconcile(store.as_ref(), user).await.unwrap();
        assert!(report.is_consistent(), "{:?}", report.discrepancies);
        assert_eq!(report.entries_replayed, 4);
        assert_eq!(report.replayed.balance, dec!(5000) - dec!(1500) - dec!(600) + dec!(620) + dec!(620));
        assert_eq!(report.replayed.holdings.get("AAPL"), Some(&dec!(6)));
        assert!(!report.replayed.holdings.contains_key("MSFT"));
    }

    #[test]
    fn replay_reports_an_overflowing_log_instead_of_panicking() {
        let user = Uuid::new_v4();
        let entry = |id, quantity, total_amount, side| Transaction {
            id,
            user_id: user,
            symbol: "X".to_string(),
            quantity,
            total_amount,
            side,
            created_at: chrono::Utc::now(),
        };
        let entries = vec![
            entry(1, dec!(-1), Decimal::MAX, TradeSide::Sell),
            entry(2, dec!(-1), Decimal::MAX, TradeSide::Sell),
        ];

        assert!(matches!(
            replay(Decimal::ZERO, &entries),
            Err(TradeError::InvalidAmount(amount)) if amount == Decimal::MAX
        ));
    }

    #[tokio::test]
    async fn aggregate_drift_is_reported() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        ledger::open(&store, user, dec!(100)).await.unwrap();

        // Write aggregates without a log entry, as a crash-era bug would have.
        let mut unit = store.begin(user).await.unwrap();
        unit.set_balance(dec!(90)).await.unwrap();
        unit.put_holding(&Symbol::parse("TSLA").unwrap(), dec!(1)).await.unwrap();
        unit.commit().await.unwrap();

        let report = reconcile(&store, user).await.unwrap();
        assert_eq!(
            report.discrepancies,
            vec![
                Discrepancy::Balance { stored: dec!(90), replayed: dec!(100) },
                Discrepancy::Holding {
                    symbol: "TSLA".to_string(),
                    stored: dec!(1),
                    replayed: Decimal::ZERO,
                },
            ]
        );
    }
}
