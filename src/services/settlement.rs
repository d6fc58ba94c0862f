//! Settlement: atomic application of a match result, and the transaction
//! that wraps snapshot -> engine -> apply for one market.
//!
//! The market row lock taken at the start of the transaction serialises all
//! mutations of one market; user balance rows are shared across markets and
//! are only ever touched with atomic arithmetic.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::models::{Execution, MarketStatus, Order, Position};
use crate::services::audit;
use crate::services::locks::MarketLocks;
use crate::services::matching::{engine, BookOrder, MarketPosition, MarketState, MatchResult};

/// Run one matching pass over a market and settle it. Takes the in-process
/// market guard; use [`execute_market_locked`] when the caller already holds
/// it.
pub async fn execute_market(
    pool: &PgPool,
    locks: &MarketLocks,
    market_id: Uuid,
) -> Result<Vec<Execution>, ExchangeError> {
    let _guard = locks.acquire(market_id).await;
    execute_market_locked(pool, market_id).await
}

/// Snapshot the market under its row lock, run the engine, apply the result,
/// audit, commit. All-or-nothing.
pub(crate) async fn execute_market_locked(
    pool: &PgPool,
    market_id: Uuid,
) -> Result<Vec<Execution>, ExchangeError> {
    let mut tx = pool.begin().await?;

    let status: Option<(MarketStatus,)> =
        sqlx::query_as("SELECT status FROM markets WHERE id = $1 FOR UPDATE")
            .bind(market_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some((status,)) = status else {
        return Err(ExchangeError::MarketClosed(market_id));
    };
    if !status.is_open() {
        // Resolution already cleared the book; nothing to match.
        return Ok(Vec::new());
    }

    let outcome_ids: Vec<Uuid> =
        sqlx::query_scalar("SELECT id FROM outcomes WHERE market_id = $1 ORDER BY number")
            .bind(market_id)
            .fetch_all(&mut *tx)
            .await?;
    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE market_id = $1 ORDER BY created_at, id")
            .bind(market_id)
            .fetch_all(&mut *tx)
            .await?;
    let positions: Vec<Position> = sqlx::query_as("SELECT * FROM positions WHERE market_id = $1")
        .bind(market_id)
        .fetch_all(&mut *tx)
        .await?;

    let state = MarketState {
        market_id,
        outcome_ids,
        orders: orders.iter().map(BookOrder::from).collect(),
        positions: positions
            .iter()
            .map(|p| MarketPosition {
                user_id: p.user_id.clone(),
                holdings: p.holdings.0.clone(),
            })
            .collect(),
    };
    if let Err(violation) = state.validate() {
        tracing::error!(%market_id, violation, "corrupt market state on load; aborting");
        std::process::abort();
    }

    let result = engine::execute(&state, Utc::now());
    if result.is_empty() {
        tx.commit().await?;
        return Ok(Vec::new());
    }

    apply(&mut tx, market_id, &result).await?;

    let touched: Vec<String> = result
        .balance_updates
        .iter()
        .map(|u| u.user_id.clone())
        .collect();
    audit::enforce(&mut tx, market_id, &touched).await?;

    tx.commit().await?;

    debug!(
        %market_id,
        executions = result.executions.len(),
        "matching pass settled"
    );
    Ok(result.executions)
}

/// Apply a match result inside an open transaction: balances, positions,
/// orders, execution records. Any failure aborts the whole set.
pub async fn apply(
    tx: &mut Transaction<'_, Postgres>,
    market_id: Uuid,
    result: &MatchResult,
) -> Result<(), sqlx::Error> {
    for update in &result.balance_updates {
        sqlx::query("UPDATE users SET balance = balance + $1, locked = locked + $2 WHERE id = $3")
            .bind(update.balance_delta)
            .bind(update.locked_delta)
            .bind(&update.user_id)
            .execute(&mut **tx)
            .await?;
    }

    // Position rows are only contended within this market, which we hold the
    // lock for, so read-modify-write is safe here.
    let mut by_user: BTreeMap<&str, Vec<(Uuid, Decimal)>> = BTreeMap::new();
    for update in &result.position_updates {
        by_user
            .entry(update.user_id.as_str())
            .or_default()
            .push((update.outcome_id, update.quantity_delta));
    }
    for (user_id, deltas) in by_user {
        let row: Option<(Uuid, Json<HashMap<Uuid, Decimal>>)> = sqlx::query_as(
            "SELECT id, holdings FROM positions WHERE user_id = $1 AND market_id = $2 FOR UPDATE",
        )
        .bind(user_id)
        .bind(market_id)
        .fetch_optional(&mut **tx)
        .await?;

        let (existing_id, mut holdings) = match row {
            Some((id, Json(holdings))) => (Some(id), holdings),
            None => (None, HashMap::new()),
        };
        for (outcome_id, delta) in deltas {
            let updated = holdings.get(&outcome_id).copied().unwrap_or(Decimal::ZERO) + delta;
            if updated.is_zero() {
                holdings.remove(&outcome_id);
            } else {
                holdings.insert(outcome_id, updated);
            }
        }

        match existing_id {
            Some(id) => {
                sqlx::query("UPDATE positions SET holdings = $1, updated_at = NOW() WHERE id = $2")
                    .bind(Json(&holdings))
                    .bind(id)
                    .execute(&mut **tx)
                    .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO positions (id, user_id, market_id, holdings) VALUES ($1, $2, $3, $4)",
                )
                .bind(Uuid::new_v4())
                .bind(user_id)
                .bind(market_id)
                .bind(Json(&holdings))
                .execute(&mut **tx)
                .await?;
            }
        }
    }

    for update in &result.order_updates {
        if update.new_quantity == 0 {
            sqlx::query("DELETE FROM orders WHERE id = $1")
                .bind(update.order_id)
                .execute(&mut **tx)
                .await?;
        } else {
            sqlx::query("UPDATE orders SET quantity = $1, escrow_amount = $2 WHERE id = $3")
                .bind(update.new_quantity)
                .bind(update.new_escrow)
                .bind(update.order_id)
                .execute(&mut **tx)
                .await?;
        }
    }

    for execution in &result.executions {
        sqlx::query(
            "INSERT INTO executions (id, market_id, kind, executed_at, participants) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(execution.id)
        .bind(execution.market_id)
        .bind(execution.kind)
        .bind(execution.executed_at)
        .bind(&execution.participants)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
