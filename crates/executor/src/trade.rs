use crate::error::TradeError;
use crate::store::{LedgerStore, LedgerUnit};
use crate::{holdings, journal, ledger};
use core_types::{
    Holding, NewTransaction, Symbol, TradeConfirmation, TradeOrder, TradeSide, Transaction,
    TransactionId,
};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// An order that passed validation, with its total computed exactly once.
#[derive(Debug, Clone)]
struct ValidatedOrder {
    user_id: Uuid,
    symbol: Symbol,
    quantity: Decimal,
    total: Decimal,
}

impl ValidatedOrder {
    fn from_order(order: &TradeOrder) -> Result<Self, TradeError> {
        if order.quantity <= Decimal::ZERO {
            return Err(TradeError::InvalidOrder(format!(
                "quantity must be greater than 0, got {}",
                order.quantity
            )));
        }
        if order.price_per_unit <= Decimal::ZERO {
            return Err(TradeError::InvalidOrder(format!(
                "price_per_unit must be greater than 0, got {}",
                order.price_per_unit
            )));
        }
        let symbol = Symbol::parse(&order.symbol)?;
        let total = order
            .quantity
            .checked_mul(order.price_per_unit)
            .ok_or_else(|| TradeError::InvalidOrder("order total is out of range".to_string()))?;

        Ok(Self {
            user_id: order.user_id,
            symbol,
            quantity: order.quantity,
            total,
        })
    }
}

/// Runs buys and sells against the ledger, the holdings, and the transaction log.
///
/// Each trade validates and then writes all three inside one [`LedgerUnit`], so
/// trades on the same account are serialized and a trade either lands fully or
/// not at all. The log entry is always written first; the balance and holdings
/// are derived state that can be rebuilt from it (see [`crate::reconcile`]).
#[derive(Clone)]
pub struct TradeExecutor {
    store: Arc<dyn LedgerStore>,
}

impl TradeExecutor {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    pub async fn buy(&self, order: &TradeOrder) -> Result<TradeConfirmation, TradeError> {
        self.execute(TradeSide::Buy, order).await
    }

    pub async fn sell(&self, order: &TradeOrder) -> Result<TradeConfirmation, TradeError> {
        self.execute(TradeSide::Sell, order).await
    }

    pub async fn execute(
        &self,
        side: TradeSide,
        order: &TradeOrder,
    ) -> Result<TradeConfirmation, TradeError> {
        let span = tracing::info_span!(
            "trade",
            user_id = %order.user_id,
            side = %side,
            symbol = %order.symbol
        );

        let result = async {
            let order = ValidatedOrder::from_order(order)?;
            let mut unit = self.store.begin(order.user_id).await?;

            let confirmation = match side {
                TradeSide::Buy => buy_within(unit.as_mut(), &order).await?,
                TradeSide::Sell => sell_within(unit.as_mut(), &order).await?,
            };

            unit.commit().await?;
            Ok::<_, TradeError>(confirmation)
        }
        .instrument(span.clone())
        .await;

        span.in_scope(|| match &result {
            Ok(confirmation) => tracing::info!(
                transaction_id = confirmation.transaction_id,
                quantity = %confirmation.quantity,
                total = %confirmation.total_amount,
                new_balance = %confirmation.new_balance,
                "Trade executed."
            ),
            Err(TradeError::Storage(err)) => {
                tracing::error!(error = %err, "Trade aborted by a storage failure; nothing was committed.")
            }
            Err(err) => tracing::warn!(reason = %err, "Trade rejected."),
        });
        result
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<Decimal, TradeError> {
        ledger::balance(self.store(), user_id).await
    }

    pub async fn holdings(&self, user_id: Uuid) -> Result<Vec<Holding>, TradeError> {
        holdings::list(self.store(), user_id).await
    }

    /// The user's transactions, most recent first.
    pub async fn transactions(&self, user_id: Uuid) -> Result<Vec<Transaction>, TradeError> {
        journal::query(self.store(), user_id).try_collect().await
    }

    /// Looks up one transaction. Entries of other users are reported as not found.
    pub async fn transaction(
        &self,
        user_id: Uuid,
        id: TransactionId,
    ) -> Result<Transaction, TradeError> {
        let transaction = journal::get(self.store(), id).await?;
        if transaction.user_id != user_id {
            return Err(TradeError::TransactionNotFound(id));
        }
        Ok(transaction)
    }
}

async fn buy_within(
    unit: &mut dyn LedgerUnit,
    order: &ValidatedOrder,
) -> Result<TradeConfirmation, TradeError> {
    // 1. Funds and position-size checks before anything is written.
    let available = unit.balance().await?;
    if available < order.total {
        return Err(TradeError::InsufficientFunds {
            required: order.total,
            available,
        });
    }
    let held = unit.shares(&order.symbol).await?.unwrap_or(Decimal::ZERO);
    if held.checked_add(order.quantity).is_none() {
        return Err(TradeError::InvalidOrder("position size is out of range".to_string()));
    }

    // 2. Log, 3. ledger, 4. holdings.
    let entry = journal::append(unit, new_entry(order, TradeSide::Buy)).await?;
    let new_balance = ledger::debit(unit, order.total).await?;
    let new_holding_shares = holdings::increase(unit, &order.symbol, order.quantity).await?;

    Ok(confirmation(entry, order, new_balance, new_holding_shares))
}

async fn sell_within(
    unit: &mut dyn LedgerUnit,
    order: &ValidatedOrder,
) -> Result<TradeConfirmation, TradeError> {
    // 1. Shares and proceeds checks before anything is written.
    let available = unit.shares(&order.symbol).await?.unwrap_or(Decimal::ZERO);
    if available < order.quantity {
        return Err(TradeError::InsufficientShares {
            symbol: order.symbol.to_string(),
            requested: order.quantity,
            available,
        });
    }
    if unit.balance().await?.checked_add(order.total).is_none() {
        return Err(TradeError::InvalidOrder("order total is out of range".to_string()));
    }

    // 2. Log, 3. ledger, 4. holdings.
    let entry = journal::append(unit, new_entry(order, TradeSide::Sell)).await?;
    let new_balance = ledger::credit(unit, order.total).await?;
    let new_holding_shares = holdings::decrease(unit, &order.symbol, order.quantity).await?;

    Ok(confirmation(entry, order, new_balance, new_holding_shares))
}

fn new_entry(order: &ValidatedOrder, side: TradeSide) -> NewTransaction {
    NewTransaction {
        user_id: order.user_id,
        symbol: order.symbol.clone(),
        quantity: side.signed(order.quantity),
        total_amount: order.total,
        side,
        created_at: None,
    }
}

fn confirmation(
    entry: Transaction,
    order: &ValidatedOrder,
    new_balance: Decimal,
    new_holding_shares: Decimal,
) -> TradeConfirmation {
    TradeConfirmation {
        transaction_id: entry.id,
        symbol: entry.symbol,
        side: entry.side,
        quantity: order.quantity,
        total_amount: entry.total_amount,
        new_balance,
        new_holding_shares,
        executed_at: entry.created_at,
    }
}
