use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use database::DbError;
use executor::TradeError;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),
    #[error("Trade error: {0}")]
    Trade(#[from] TradeError),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Password digest error: {0}")]
    PasswordDigest(#[from] bcrypt::BcryptError),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Unreadable or mistyped JSON bodies.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

/// Path segments that do not parse, such as a non-numeric transaction id.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(format!("Invalid path: {}", rejection.body_text()))
    }
}

impl AppError {
    /// The status code and the caller-facing reason for this error.
    fn status_and_message(self) -> (StatusCode, String) {
        match self {
            AppError::Database(DbError::Conflict(message)) => (StatusCode::CONFLICT, message),
            AppError::Database(DbError::NotFound) => {
                (StatusCode::NOT_FOUND, "User not found".to_string())
            }
            AppError::Database(db_err) => {
                tracing::error!(error = ?db_err, "Database error.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal database error occurred".to_string(),
                )
            }
            AppError::Trade(trade_err) => match trade_err {
                TradeError::InvalidOrder(_) | TradeError::InvalidAmount(_) => {
                    (StatusCode::BAD_REQUEST, trade_err.to_string())
                }
                TradeError::InsufficientFunds { .. } => {
                    (StatusCode::BAD_REQUEST, "Insufficient balance".to_string())
                }
                TradeError::InsufficientShares { .. } => {
                    (StatusCode::BAD_REQUEST, "Insufficient stock quantity".to_string())
                }
                TradeError::AccountNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Account not found".to_string())
                }
                TradeError::TransactionNotFound(_) => {
                    (StatusCode::NOT_FOUND, "Transaction not found".to_string())
                }
                TradeError::Storage(store_err) => {
                    tracing::error!(error = ?store_err, "Ledger storage error.");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "Internal Server Error".to_string(),
                    )
                }
            },
            err @ (AppError::PasswordDigest(_) | AppError::Task(_)) => {
                tracing::error!(error = %err, "Password hashing failed.");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            ),
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        }
    }
}

/// Converts our custom `AppError` into an HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = self.status_and_message();
        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use executor::StoreError;
    use rust_decimal_macros::dec;

    fn status_of(err: AppError) -> (StatusCode, String) {
        err.status_and_message()
    }

    #[test]
    fn each_trade_rejection_has_its_own_reason() {
        let funds = status_of(
            TradeError::InsufficientFunds { required: dec!(2), available: dec!(1) }.into(),
        );
        let shares = status_of(
            TradeError::InsufficientShares {
                symbol: "AAPL".to_string(),
                requested: dec!(2),
                available: dec!(1),
            }
            .into(),
        );
        let invalid = status_of(TradeError::InvalidOrder("quantity must be greater than 0, got 0".to_string()).into());

        assert_eq!(funds, (StatusCode::BAD_REQUEST, "Insufficient balance".to_string()));
        assert_eq!(shares, (StatusCode::BAD_REQUEST, "Insufficient stock quantity".to_string()));
        assert_eq!(invalid.0, StatusCode::BAD_REQUEST);
        assert!(invalid.1.starts_with("Invalid order"));
    }

    #[test]
    fn storage_failures_are_reported_generically() {
        let io = std::io::Error::other("disk on fire");
        let (status, message) =
            status_of(TradeError::Storage(StoreError::backend(io)).into());

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!message.contains("disk"));
    }

    #[test]
    fn lookups_map_to_not_found_and_conflicts_to_409() {
        assert_eq!(
            status_of(TradeError::TransactionNotFound(7).into()).0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(DbError::Conflict("taken".to_string()).into()),
            (StatusCode::CONFLICT, "taken".to_string())
        );
        assert_eq!(status_of(AppError::Unauthorized).0, StatusCode::UNAUTHORIZED);
    }
}
