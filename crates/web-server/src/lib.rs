//! # Folio Web Server Crate
//!
//! The HTTP surface of the portfolio tracker. Authentication happens here and
//! only here: handlers resolve the caller's `user_id` from the session token
//! and hand it to the `TradeExecutor`, which trusts it.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use configuration::Config;
use database::DbRepository;
use executor::TradeExecutor;
use rust_decimal::Decimal;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;

use auth::SessionKeys;

/// The shared application state that all handlers can access.
#[derive(Clone)]
pub struct AppState {
    pub db_repo: DbRepository,
    pub executor: TradeExecutor,
    pub sessions: SessionKeys,
    /// Cash credited to every account opened by `/register`.
    pub opening_balance: Decimal,
}

impl AppState {
    /// State backed entirely by PostgreSQL: the repository is both the user
    /// directory and the executor's ledger store.
    pub fn new(db_repo: DbRepository, config: &Config) -> Self {
        let executor = TradeExecutor::new(Arc::new(db_repo.clone()));
        Self {
            db_repo,
            executor,
            sessions: SessionKeys::new(&config.session.secret, config.session.ttl_minutes),
            opening_balance: config.ledger.opening_balance,
        }
    }
}

/// CORS for the configured browser origins. Credentials are allowed so the
/// session cookie travels with cross-origin requests.
pub fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}

/// Builds the router with every route and middleware layer.
pub fn build_router(state: Arc<AppState>, cors: CorsLayer) -> Router {
    Router::new()
        .route("/api/health", get(|| async { "OK" }))
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
        .route("/session", get(handlers::session))
        .route("/users/:id", get(handlers::get_user).put(handlers::update_user))
        .route("/buy", post(handlers::buy))
        .route("/sell", post(handlers::sell))
        .route("/shareholding", get(handlers::get_holdings))
        .route("/transactions", get(handlers::get_transactions))
        .route("/transactions/:id", get(handlers::get_transaction))
        .route("/balance", get(handlers::get_balance))
        .route("/api/user-data", get(handlers::get_user_data))
        .with_state(state)
        .layer(cors)
        // Logs every incoming request.
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(64 * 1024))
}

/// The main function to configure and run the web server.
///
/// Tracing is initialized by the binary that calls this.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let db_pool = database::connect(&config.database).await?;
    database::run_migrations(&db_pool).await?;
    let db_repo = DbRepository::new(db_pool);

    let app_state = Arc::new(AppState::new(db_repo, &config));
    let app = build_router(app_state, cors_layer(&config.server.allowed_origins)?);

    let addr = config.server.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web server listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
