//! Exchange error surface.
//!
//! Every user-recoverable failure is a structured variant the host can map
//! onto its own surface; storage failures stay generic on the wire with the
//! detail logged server-side.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("market {0} is not open for trading")]
    MarketClosed(Uuid),

    #[error("outcome {0} does not belong to this market")]
    InvalidOutcome(Uuid),

    #[error("user already has a resting order in this market")]
    OrderAlreadyExists,

    #[error("insufficient available balance: required {required}, available {available}")]
    InsufficientBalance {
        required: Decimal,
        available: Decimal,
    },

    #[error("no resting order for this user in this market")]
    NoSuchOrder,

    #[error("market {0} is already resolved")]
    AlreadyResolved(Uuid),

    #[error("caller is not the market oracle")]
    NotOracle,

    #[error("operation timed out; no state was changed")]
    Timeout,

    #[error("storage error")]
    Internal(#[from] sqlx::Error),
}

impl ExchangeError {
    pub fn code(&self) -> &'static str {
        match self {
            ExchangeError::InvalidParameters(_) => "INVALID_PARAMETERS",
            ExchangeError::MarketClosed(_) => "MARKET_CLOSED",
            ExchangeError::InvalidOutcome(_) => "INVALID_OUTCOME",
            ExchangeError::OrderAlreadyExists => "ORDER_ALREADY_EXISTS",
            ExchangeError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
            ExchangeError::NoSuchOrder => "NO_SUCH_ORDER",
            ExchangeError::AlreadyResolved(_) => "ALREADY_RESOLVED",
            ExchangeError::NotOracle => "NOT_ORACLE",
            ExchangeError::Timeout => "TIMEOUT",
            ExchangeError::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ExchangeError::InvalidParameters(_) | ExchangeError::InsufficientBalance { .. } => {
                StatusCode::BAD_REQUEST
            }
            ExchangeError::InvalidOutcome(_) | ExchangeError::NoSuchOrder => StatusCode::NOT_FOUND,
            ExchangeError::MarketClosed(_)
            | ExchangeError::OrderAlreadyExists
            | ExchangeError::AlreadyResolved(_) => StatusCode::CONFLICT,
            ExchangeError::NotOracle => StatusCode::FORBIDDEN,
            ExchangeError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ExchangeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for ExchangeError {
    fn into_response(self) -> Response {
        let message = match &self {
            ExchangeError::Internal(source) => {
                tracing::error!(error = %source, "storage failure");
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = ErrorResponse {
            error: message,
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_recoverable_errors_are_not_5xx() {
        let errors = [
            ExchangeError::InvalidParameters("x".into()),
            ExchangeError::MarketClosed(Uuid::new_v4()),
            ExchangeError::InvalidOutcome(Uuid::new_v4()),
            ExchangeError::OrderAlreadyExists,
            ExchangeError::InsufficientBalance {
                required: Decimal::ONE,
                available: Decimal::ZERO,
            },
            ExchangeError::NoSuchOrder,
            ExchangeError::AlreadyResolved(Uuid::new_v4()),
            ExchangeError::NotOracle,
        ];
        for error in errors {
            assert!(error.status().is_client_error(), "{}", error.code());
        }
    }
}
