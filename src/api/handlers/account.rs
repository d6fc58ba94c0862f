//! Account endpoints: balances, positions, orders, and the credit hook the
//! external balance seeder calls.

use axum::extract::{Path, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ExchangeError;
use crate::models::{Order, Position, User};
use crate::services::market;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: String,
    pub balance: Decimal,
    pub locked: Decimal,
    pub available: Decimal,
}

impl From<User> for BalanceResponse {
    fn from(user: User) -> Self {
        let available = user.available();
        Self {
            user_id: user.id,
            balance: user.balance,
            locked: user.locked,
            available,
        }
    }
}

/// GET /account/:user_id/balance
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ExchangeError> {
    // Unknown users simply have an empty ledger.
    let user = market::get_user(&state.db.pool, &user_id).await?;
    match user {
        Some(user) => Ok(Json(user.into())),
        None => Ok(Json(BalanceResponse {
            user_id,
            balance: Decimal::ZERO,
            locked: Decimal::ZERO,
            available: Decimal::ZERO,
        })),
    }
}

/// GET /account/:user_id/positions
pub async fn get_positions(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Position>>, ExchangeError> {
    let positions = market::user_positions(&state.db.pool, &user_id).await?;
    Ok(Json(positions))
}

/// GET /account/:user_id/orders
pub async fn get_orders(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Order>>, ExchangeError> {
    let orders = market::user_orders(&state.db.pool, &user_id).await?;
    Ok(Json(orders))
}

#[derive(Debug, Deserialize)]
pub struct CreditBody {
    pub amount: Decimal,
}

/// POST /account/:user_id/credit
pub async fn credit(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
    Json(body): Json<CreditBody>,
) -> Result<Json<BalanceResponse>, ExchangeError> {
    let user = market::credit_user(&state.db.pool, &user_id, body.amount).await?;
    Ok(Json(user.into()))
}
