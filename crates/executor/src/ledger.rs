//! The Account Ledger: the single cash balance of an account.
//!
//! Balances only move through [`debit`] and [`credit`], which run inside a
//! [`LedgerUnit`] so they commit or roll back together with the rest of a trade.

use crate::error::TradeError;
use crate::store::{LedgerStore, LedgerUnit};
use core_types::Account;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Opens a new account funded with `opening_balance`.
pub async fn open(
    store: &dyn LedgerStore,
    account_id: Uuid,
    opening_balance: Decimal,
) -> Result<Account, TradeError> {
    if opening_balance.is_sign_negative() {
        return Err(TradeError::InvalidAmount(opening_balance));
    }
    let account = store.open_account(account_id, opening_balance).await?;
    tracing::info!(account_id = %account_id, %opening_balance, "Account opened.");
    Ok(account)
}

/// The committed balance of an account.
pub async fn balance(store: &dyn LedgerStore, account_id: Uuid) -> Result<Decimal, TradeError> {
    Ok(store.account(account_id).await?.balance)
}

/// Removes `amount` from the balance and returns the new balance.
pub async fn debit(unit: &mut dyn LedgerUnit, amount: Decimal) -> Result<Decimal, TradeError> {
    if amount.is_sign_negative() {
        return Err(TradeError::InvalidAmount(amount));
    }

    let available = unit.balance().await?;
    if amount > available {
        return Err(TradeError::InsufficientFunds {
            required: amount,
            available,
        });
    }

    let new_balance = available - amount;
    unit.set_balance(new_balance).await?;
    Ok(new_balance)
}

/// Adds `amount` to the balance and returns the new balance. A credit the
/// balance cannot represent is `InvalidAmount`.
pub async fn credit(unit: &mut dyn LedgerUnit, amount: Decimal) -> Result<Decimal, TradeError> {
    if amount.is_sign_negative() {
        return Err(TradeError::InvalidAmount(amount));
    }

    let new_balance = unit
        .balance()
        .await?
        .checked_add(amount)
        .ok_or(TradeError::InvalidAmount(amount))?;
    unit.set_balance(new_balance).await?;
    Ok(new_balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use rust_decimal_macros::dec;

    async fn funded(amount: Decimal) -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        open(&store, id, amount).await.unwrap();
        (store, id)
    }

    #[tokio::test]
    async fn debit_and_credit_persist_on_commit() {
        let (store, id) = funded(dec!(1000)).await;

        let mut unit = store.begin(id).await.unwrap();
        assert_eq!(debit(unit.as_mut(), dec!(250.25)).await.unwrap(), dec!(749.75));
        assert_eq!(credit(unit.as_mut(), dec!(0.25)).await.unwrap(), dec!(750.00));
        unit.commit().await.unwrap();

        assert_eq!(balance(&store, id).await.unwrap(), dec!(750));
    }

    #[tokio::test]
    async fn debit_beyond_balance_is_rejected_without_change() {
        let (store, id) = funded(dec!(100)).await;

        let mut unit = store.begin(id).await.unwrap();
        let err = debit(unit.as_mut(), dec!(100.01)).await.unwrap_err();
        assert!(matches!(
            err,
            TradeError::InsufficientFunds { required, available }
                if required == dec!(100.01) && available == dec!(100)
        ));
        // The whole balance can still be spent.
        assert_eq!(debit(unit.as_mut(), dec!(100)).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn negative_amounts_are_invalid() {
        let (store, id) = funded(dec!(100)).await;

        let mut unit = store.begin(id).await.unwrap();
        assert!(matches!(
            debit(unit.as_mut(), dec!(-1)).await,
            Err(TradeError::InvalidAmount(_))
        ));
        assert!(matches!(
            credit(unit.as_mut(), dec!(-1)).await,
            Err(TradeError::InvalidAmount(_))
        ));
        assert!(matches!(
            open(&store, Uuid::new_v4(), dec!(-5)).await,
            Err(TradeError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn credit_past_the_representable_range_is_rejected() {
        let (store, id) = funded(Decimal::MAX).await;

        let mut unit = store.begin(id).await.unwrap();
        assert!(matches!(
            credit(unit.as_mut(), dec!(1)).await,
            Err(TradeError::InvalidAmount(amount)) if amount == dec!(1)
        ));
        assert_eq!(unit.balance().await.unwrap(), Decimal::MAX);
    }

    #[tokio::test]
    async fn dropped_unit_leaves_balance_untouched() {
        let (store, id) = funded(dec!(500)).await;

        {
            let mut unit = store.begin(id).await.unwrap();
            debit(unit.as_mut(), dec!(200)).await.unwrap();
        }

        assert_eq!(balance(&store, id).await.unwrap(), dec!(500));
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let store = InMemoryStore::new();
        let missing = Uuid::new_v4();
        assert!(matches!(
            balance(&store, missing).await,
            Err(TradeError::AccountNotFound(id)) if id == missing
        ));
    }
}
