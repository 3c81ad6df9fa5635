use crate::error::DbError;
use configuration::Database;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::env;
use std::time::Duration;

/// Establishes a connection pool to the PostgreSQL database.
///
/// The URL comes from `settings.url`, falling back to `DATABASE_URL` (a `.env`
/// file is honoured). The pool is the explicit persistence handle that gets
/// passed to every component that needs the database.
pub async fn connect(settings: &Database) -> Result<PgPool, DbError> {
    // Load environment variables from the .env file, if there is one.
    dotenvy::dotenv().ok();

    let database_url = match &settings.url {
        Some(url) => url.clone(),
        None => env::var("DATABASE_URL").map_err(|_e| {
            DbError::ConnectionConfigError("database.url or DATABASE_URL must be set.".to_string())
        })?,
    };

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(&database_url)
        .await?;

    tracing::info!(max_connections = settings.max_connections, "Database pool ready.");
    Ok(pool)
}

/// Applies the embedded migrations so the schema matches this build.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    // Use a relative path from the crate root
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
