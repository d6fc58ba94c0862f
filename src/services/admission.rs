//! Order admission and cancellation.
//!
//! Admission validates, locks escrow and persists the order in one
//! transaction, then runs a matching pass over the market. Checks run in a
//! fixed order so the caller always sees the most specific failure.

use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::info;
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::models::{Execution, MarketStatus, Order, OrderSide};
use crate::services::escrow::required_escrow;
use crate::services::locks::MarketLocks;
use crate::services::settlement;

/// A new order as submitted by the host.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub user_id: String,
    pub market_id: Uuid,
    pub outcome_id: Uuid,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: Decimal,
}

/// Outcome of admitting an order and running the matching pass it triggers.
#[derive(Debug, Clone)]
pub struct OrderPlacement {
    /// The order as admitted, before matching.
    pub admitted: Order,
    /// What is still resting after matching, if anything.
    pub resting: Option<Order>,
    pub executions: Vec<Execution>,
}

/// Parameter validation, independent of storage state.
pub fn validate_parameters(request: &OrderRequest, max_quantity: i64) -> Result<(), ExchangeError> {
    if request.user_id.trim().is_empty() {
        return Err(ExchangeError::InvalidParameters(
            "user id must not be empty".to_string(),
        ));
    }
    if request.quantity <= 0 || request.quantity > max_quantity {
        return Err(ExchangeError::InvalidParameters(format!(
            "quantity must be between 1 and {}, got {}",
            max_quantity, request.quantity
        )));
    }
    if request.price <= Decimal::ZERO || request.price >= Decimal::ONE {
        return Err(ExchangeError::InvalidParameters(format!(
            "price must be strictly between 0 and 1, got {}",
            request.price
        )));
    }
    Ok(())
}

/// Admit an order, then match the market. Returns the admitted order, the
/// resting remainder and any executions the pass produced.
pub async fn create_order(
    pool: &PgPool,
    locks: &MarketLocks,
    max_quantity: i64,
    request: OrderRequest,
) -> Result<OrderPlacement, ExchangeError> {
    let _guard = locks.acquire(request.market_id).await;

    let admitted = admit(pool, &request, max_quantity).await?;
    let executions = settlement::execute_market_locked(pool, request.market_id).await?;
    let resting: Option<Order> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(admitted.id)
        .fetch_optional(pool)
        .await?;

    Ok(OrderPlacement {
        admitted,
        resting,
        executions,
    })
}

/// The admission transaction: lock the market row, run the checks in their
/// fixed order, lock escrow, insert the order.
async fn admit(
    pool: &PgPool,
    request: &OrderRequest,
    max_quantity: i64,
) -> Result<Order, ExchangeError> {
    let mut tx = pool.begin().await?;

    let status: Option<(MarketStatus,)> =
        sqlx::query_as("SELECT status FROM markets WHERE id = $1 FOR UPDATE")
            .bind(request.market_id)
            .fetch_optional(&mut *tx)
            .await?;
    match status {
        Some((status,)) if status.is_open() => {}
        _ => return Err(ExchangeError::MarketClosed(request.market_id)),
    }

    let outcome: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM outcomes WHERE id = $1 AND market_id = $2")
            .bind(request.outcome_id)
            .bind(request.market_id)
            .fetch_optional(&mut *tx)
            .await?;
    if outcome.is_none() {
        return Err(ExchangeError::InvalidOutcome(request.outcome_id));
    }

    validate_parameters(request, max_quantity)?;

    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM orders WHERE user_id = $1 AND market_id = $2")
            .bind(&request.user_id)
            .bind(request.market_id)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(ExchangeError::OrderAlreadyExists);
    }

    // Users exist from their first reference onwards.
    sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(&request.user_id)
        .execute(&mut *tx)
        .await?;

    let holdings: Option<(Json<HashMap<Uuid, Decimal>>,)> =
        sqlx::query_as("SELECT holdings FROM positions WHERE user_id = $1 AND market_id = $2")
            .bind(&request.user_id)
            .bind(request.market_id)
            .fetch_optional(&mut *tx)
            .await?;
    let owned = holdings
        .map(|(Json(map),)| map.get(&request.outcome_id).copied().unwrap_or(Decimal::ZERO))
        .unwrap_or(Decimal::ZERO);

    let escrow = required_escrow(request.side, request.quantity, request.price, owned);

    // Check-and-lock in one atomic statement; the user row is contended
    // across markets.
    let locked = sqlx::query(
        "UPDATE users SET locked = locked + $1 WHERE id = $2 AND balance - locked >= $1",
    )
    .bind(escrow)
    .bind(&request.user_id)
    .execute(&mut *tx)
    .await?;
    if locked.rows_affected() == 0 {
        let (balance, user_locked): (Decimal, Decimal) =
            sqlx::query_as("SELECT balance, locked FROM users WHERE id = $1")
                .bind(&request.user_id)
                .fetch_one(&mut *tx)
                .await?;
        return Err(ExchangeError::InsufficientBalance {
            required: escrow,
            available: balance - user_locked,
        });
    }

    let order: Order = sqlx::query_as(
        "INSERT INTO orders (id, user_id, market_id, outcome_id, side, quantity, price, escrow_amount) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&request.user_id)
    .bind(request.market_id)
    .bind(request.outcome_id)
    .bind(request.side)
    .bind(request.quantity)
    .bind(request.price)
    .bind(escrow)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    info!(
        order_id = %order.id,
        market_id = %order.market_id,
        user_id = %order.user_id,
        side = %order.side,
        quantity = order.quantity,
        price = %order.price,
        "order admitted"
    );
    Ok(order)
}

/// Cancel the caller's resting order in a market, refunding its escrow.
/// Cancelling twice reports NoSuchOrder; the book is unchanged.
pub async fn cancel_order(
    pool: &PgPool,
    locks: &MarketLocks,
    user_id: &str,
    market_id: Uuid,
) -> Result<Order, ExchangeError> {
    let _guard = locks.acquire(market_id).await;
    let mut tx = pool.begin().await?;

    // Serialise with matching; a resolved or unknown market has no orders.
    sqlx::query("SELECT id FROM markets WHERE id = $1 FOR UPDATE")
        .bind(market_id)
        .execute(&mut *tx)
        .await?;

    let order: Option<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 AND market_id = $2 FOR UPDATE")
            .bind(user_id)
            .bind(market_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some(order) = order else {
        return Err(ExchangeError::NoSuchOrder);
    };

    sqlx::query("UPDATE users SET locked = locked - $1 WHERE id = $2")
        .bind(order.escrow_amount)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(order.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(order_id = %order.id, %market_id, user_id, "order cancelled");
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(quantity: i64, price: Decimal) -> OrderRequest {
        OrderRequest {
            user_id: "u1".to_string(),
            market_id: Uuid::new_v4(),
            outcome_id: Uuid::new_v4(),
            side: OrderSide::Buy,
            quantity,
            price,
        }
    }

    #[test]
    fn test_price_bounds_are_exclusive() {
        assert!(validate_parameters(&request(10, dec!(0)), 1000).is_err());
        assert!(validate_parameters(&request(10, dec!(1)), 1000).is_err());
        assert!(validate_parameters(&request(10, dec!(0.01)), 1000).is_ok());
        assert!(validate_parameters(&request(10, dec!(0.99)), 1000).is_ok());
    }

    #[test]
    fn test_quantity_bounds() {
        assert!(validate_parameters(&request(0, dec!(0.5)), 1000).is_err());
        assert!(validate_parameters(&request(-5, dec!(0.5)), 1000).is_err());
        assert!(validate_parameters(&request(1001, dec!(0.5)), 1000).is_err());
        assert!(validate_parameters(&request(1000, dec!(0.5)), 1000).is_ok());
        assert!(validate_parameters(&request(1, dec!(0.5)), 1000).is_ok());
    }

    #[test]
    fn test_blank_user_rejected() {
        let mut req = request(10, dec!(0.5));
        req.user_id = "  ".to_string();
        assert!(validate_parameters(&req, 1000).is_err());
    }
}
