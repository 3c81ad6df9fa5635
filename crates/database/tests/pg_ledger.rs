//! Runs the ledger against a real PostgreSQL instance.
//!
//! `DATABASE_URL=postgres://... cargo test -p database -- --ignored`

use configuration::Database;
use core_types::TradeOrder;
use database::{DbRepository, connect, run_migrations};
use executor::{TradeError, TradeExecutor, reconcile};
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

async fn repository() -> DbRepository {
    let settings = Database {
        url: None,
        max_connections: 5,
        acquire_timeout_secs: 5,
    };
    let pool = connect(&settings).await.expect("DATABASE_URL must point at a test database");
    run_migrations(&pool).await.expect("migrations apply");
    DbRepository::new(pool)
}

async fn registered_user(repo: &DbRepository) -> Uuid {
    let id = Uuid::new_v4();
    repo.register_user(id, "tester", &format!("{id}@example.test"), "salt$hash", dec!(100000))
        .await
        .unwrap();
    id
}

fn order(user_id: Uuid, symbol: &str, quantity: rust_decimal::Decimal, price: rust_decimal::Decimal) -> TradeOrder {
    TradeOrder {
        user_id,
        symbol: symbol.to_string(),
        quantity,
        price_per_unit: price,
    }
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn buy_then_sell_round_trip() {
    let repo = repository().await;
    let user = registered_user(&repo).await;
    let executor = TradeExecutor::new(Arc::new(repo.clone()));

    let bought = executor.buy(&order(user, "aapl", dec!(10), dec!(150))).await.unwrap();
    assert_eq!(bought.new_balance, dec!(98500));
    assert_eq!(executor.holdings(user).await.unwrap().len(), 1);

    let sold = executor.sell(&order(user, "AAPL", dec!(10), dec!(160))).await.unwrap();
    assert_eq!(sold.new_balance, dec!(100100));
    assert!(executor.holdings(user).await.unwrap().is_empty());

    let log = executor.transactions(user).await.unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].quantity, dec!(-10));
    assert!(reconcile(&repo, user).await.unwrap().is_consistent());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_sells_are_serialized_by_the_row_lock() {
    let repo = repository().await;
    let user = registered_user(&repo).await;
    let executor = TradeExecutor::new(Arc::new(repo.clone()));
    executor.buy(&order(user, "MSFT", dec!(3), dec!(100))).await.unwrap();

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let executor = executor.clone();
            tokio::spawn(async move { executor.sell(&order(user, "msft", dec!(1), dec!(100))).await })
        })
        .collect();

    let mut filled = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => filled += 1,
            Err(TradeError::InsufficientShares { .. }) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(filled, 3);
    assert_eq!(executor.balance(user).await.unwrap(), dec!(100000));
    assert!(reconcile(&repo, user).await.unwrap().is_consistent());
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_email_is_a_conflict() {
    let repo = repository().await;
    let email = format!("{}@example.test", Uuid::new_v4());

    repo.register_user(Uuid::new_v4(), "first", &email, "salt$hash", dec!(0)).await.unwrap();
    let second = repo.register_user(Uuid::new_v4(), "second", &email, "salt$hash", dec!(0)).await;

    assert!(matches!(second, Err(database::DbError::Conflict(_))));
}

#[tokio::test]
#[ignore = "requires DATABASE_URL"]
async fn profile_update_keeps_the_password_unless_replaced() {
    let repo = repository().await;
    let user = registered_user(&repo).await;
    let email = format!("renamed-{user}@example.test");

    let updated = repo.update_user(user, "renamed", &email, None).await.unwrap();
    assert_eq!(updated.username, "renamed");
    assert_eq!(updated.email, email);
    assert_eq!(updated.password_hash, "salt$hash");

    let rehashed = repo.update_user(user, "renamed", &email, Some("new$hash")).await.unwrap();
    assert_eq!(rehashed.password_hash, "new$hash");

    let missing = repo.update_user(Uuid::new_v4(), "ghost", "ghost@example.test", None).await;
    assert!(matches!(missing, Err(database::DbError::NotFound)));
}
