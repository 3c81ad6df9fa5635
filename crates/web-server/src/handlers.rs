use crate::{
    AppState,
    auth::{self, AuthUser},
    error::AppError,
    extract::{Json, Path},
};
use axum::{
    extract::{State, rejection::JsonRejection},
    http::{StatusCode, header},
    response::IntoResponse,
};
use core_types::{Holding, TradeConfirmation, TradeOrder, TradeSide, Transaction, TransactionId};
use database::DbUser;
use executor::TradeError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Body of `PUT /users/:id`. The password is only replaced when present.
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
    pub email: String,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<DbUser> for UserResponse {
    fn from(user: DbUser) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
}

/// Body of `POST /buy` and `POST /sell`.
#[derive(Debug, Deserialize)]
pub struct TradeRequest {
    #[serde(alias = "stock_name")]
    pub symbol: String,
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}

#[derive(Debug, Serialize)]
pub struct UserDataResponse {
    pub username: String,
    pub email: String,
    pub balance: Decimal,
    pub holdings: Vec<Holding>,
}

fn validate_profile(username: &str, email: &str) -> Result<(), AppError> {
    if username.trim().is_empty() {
        return Err(AppError::BadRequest("username must not be empty".to_string()));
    }
    if !email.contains('@') {
        return Err(AppError::BadRequest(format!("invalid email: {email}")));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.len() < 8 {
        return Err(AppError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }
    Ok(())
}

fn validate_registration(req: &RegisterRequest) -> Result<(), AppError> {
    validate_profile(&req.username, &req.email)?;
    validate_password(&req.password)
}

/// # POST /register
/// Creates the user and opens their cash account with the configured opening balance.
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    validate_registration(&req)?;
    let email = req.email.trim().to_lowercase();
    let password_hash = auth::hash_password(req.password).await?;

    let user = state
        .db_repo
        .register_user(
            Uuid::new_v4(),
            req.username.trim(),
            &email,
            &password_hash,
            state.opening_balance,
        )
        .await?;

    tracing::info!(user_id = %user.id, "Registered new user.");
    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

/// # POST /login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let email = req.email.trim().to_lowercase();
    let user = state
        .db_repo
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;
    if !auth::verify_password(req.password, user.password_hash.clone()).await? {
        return Err(AppError::InvalidCredentials);
    }

    let token = state.sessions.issue(user.id, chrono::Utc::now());
    let cookie = state.sessions.cookie(&token);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse {
            user: UserResponse::from(user),
            token,
        }),
    ))
}

/// # POST /logout
pub async fn logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, auth::expired_cookie())],
        Json(json!({ "message": "Logged out successfully" })),
    )
}

/// # GET /session
pub async fn session(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    let user = state.db_repo.get_user(user_id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// # GET /users/:id
/// Only the caller's own record is visible.
pub async fn get_user(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserResponse>, AppError> {
    if id != user_id {
        return Err(AppError::Forbidden);
    }
    let user = state.db_repo.get_user(id).await?;
    Ok(Json(UserResponse::from(user)))
}

/// # PUT /users/:id
/// Replaces username and email, and the password when one is supplied.
pub async fn update_user(
    Path(id): Path<Uuid>,
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if id != user_id {
        return Err(AppError::Forbidden);
    }
    validate_profile(&req.username, &req.email)?;
    let password_hash = match req.password {
        Some(password) => {
            validate_password(&password)?;
            Some(auth::hash_password(password).await?)
        }
        None => None,
    };

    let email = req.email.trim().to_lowercase();
    let user = state
        .db_repo
        .update_user(id, req.username.trim(), &email, password_hash.as_deref())
        .await?;

    tracing::info!(user_id = %id, password_changed = password_hash.is_some(), "Updated user profile.");
    Ok(Json(UserResponse::from(user)))
}

async fn trade(
    state: &AppState,
    side: TradeSide,
    user_id: Uuid,
    body: Result<axum::Json<TradeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TradeConfirmation>), AppError> {
    // A body whose quantity or price does not parse is a malformed order.
    let axum::Json(req) =
        body.map_err(|rejection| TradeError::InvalidOrder(rejection.body_text()))?;
    let order = TradeOrder {
        user_id,
        symbol: req.symbol,
        quantity: req.quantity,
        price_per_unit: req.price_per_unit,
    };
    let confirmation = state.executor.execute(side, &order).await?;
    Ok((StatusCode::CREATED, Json(confirmation)))
}

/// # POST /buy
pub async fn buy(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: Result<axum::Json<TradeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TradeConfirmation>), AppError> {
    trade(&state, TradeSide::Buy, user_id, body).await
}

/// # POST /sell
pub async fn sell(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
    body: Result<axum::Json<TradeRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TradeConfirmation>), AppError> {
    trade(&state, TradeSide::Sell, user_id, body).await
}

/// # GET /shareholding
pub async fn get_holdings(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Holding>>, AppError> {
    Ok(Json(state.executor.holdings(user_id).await?))
}

/// # GET /transactions
/// Most recent first.
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Transaction>>, AppError> {
    Ok(Json(state.executor.transactions(user_id).await?))
}

/// # GET /transactions/:id
pub async fn get_transaction(
    Path(id): Path<TransactionId>,
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Transaction>, AppError> {
    Ok(Json(state.executor.transaction(user_id, id).await?))
}

/// # GET /balance
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<BalanceResponse>, AppError> {
    let balance = state.executor.balance(user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// # GET /api/user-data
/// Profile, balance and holdings in one round trip for the dashboard.
pub async fn get_user_data(
    State(state): State<Arc<AppState>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserDataResponse>, AppError> {
    let user = state.db_repo.get_user(user_id).await?;
    let balance = state.executor.balance(user_id).await?;
    let holdings = state.executor.holdings(user_id).await?;

    Ok(Json(UserDataResponse {
        username: user.username,
        email: user.email,
        balance,
        holdings,
    }))
}
