//! Market resolution.
//!
//! The oracle declares a winner; in one transaction every outstanding order
//! is cancelled with its escrow refunded, every holder of the winning
//! outcome is paid 1.00 per contract (shorts pay out of their balance), and
//! the market's orders and positions are cleared.

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::models::{Market, Position};
use crate::services::locks::MarketLocks;

#[derive(Debug, Clone, Serialize)]
pub struct Payout {
    pub user_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveSummary {
    pub market_id: Uuid,
    pub winning_outcome_id: Uuid,
    pub payouts: Vec<Payout>,
    pub total_payout: Decimal,
    pub winner_count: usize,
}

/// Each winning contract pays exactly 1.00. Holdings may be fractional from
/// basket-surplus distribution; the payout is rounded here, at the single
/// point where contracts become cash.
fn winning_payout(position: &Position, winning_outcome_id: Uuid) -> Decimal {
    position.holding_of(winning_outcome_id).round_dp(8)
}

pub async fn resolve_market(
    pool: &PgPool,
    locks: &MarketLocks,
    market_id: Uuid,
    winning_outcome_id: Uuid,
    caller_user_id: &str,
) -> Result<ResolveSummary, ExchangeError> {
    let _guard = locks.acquire(market_id).await;
    let mut tx = pool.begin().await?;

    let market: Option<Market> = sqlx::query_as("SELECT * FROM markets WHERE id = $1 FOR UPDATE")
        .bind(market_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(market) = market else {
        return Err(ExchangeError::InvalidParameters(format!(
            "unknown market {}",
            market_id
        )));
    };
    if !market.status.is_open() {
        return Err(ExchangeError::AlreadyResolved(market_id));
    }
    if market.oracle_user_id != caller_user_id {
        return Err(ExchangeError::NotOracle);
    }
    let outcome: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM outcomes WHERE id = $1 AND market_id = $2")
            .bind(winning_outcome_id)
            .bind(market_id)
            .fetch_optional(&mut *tx)
            .await?;
    if outcome.is_none() {
        return Err(ExchangeError::InvalidOutcome(winning_outcome_id));
    }

    sqlx::query(
        "UPDATE markets SET status = 'resolved', winning_outcome_id = $1, resolved_at = $2 \
         WHERE id = $3",
    )
    .bind(winning_outcome_id)
    .bind(Utc::now())
    .bind(market_id)
    .execute(&mut *tx)
    .await?;

    // Refund escrow of every outstanding order, then drop the book.
    let open_orders: Vec<(String, Decimal)> =
        sqlx::query_as("SELECT user_id, escrow_amount FROM orders WHERE market_id = $1")
            .bind(market_id)
            .fetch_all(&mut *tx)
            .await?;
    for (user_id, escrow_amount) in &open_orders {
        sqlx::query("UPDATE users SET locked = locked - $1 WHERE id = $2")
            .bind(escrow_amount)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }
    sqlx::query("DELETE FROM orders WHERE market_id = $1")
        .bind(market_id)
        .execute(&mut *tx)
        .await?;

    // Pay winning holdings; negative holdings settle as a liability, which
    // their escrow at sale time collateralised.
    let positions: Vec<Position> = sqlx::query_as("SELECT * FROM positions WHERE market_id = $1")
        .bind(market_id)
        .fetch_all(&mut *tx)
        .await?;

    let mut payouts = Vec::new();
    for position in positions {
        let amount = winning_payout(&position, winning_outcome_id);
        if !amount.is_zero() {
            sqlx::query("UPDATE users SET balance = balance + $1 WHERE id = $2")
                .bind(amount)
                .bind(&position.user_id)
                .execute(&mut *tx)
                .await?;
            payouts.push(Payout {
                user_id: position.user_id,
                amount,
            });
        }
    }
    sqlx::query("DELETE FROM positions WHERE market_id = $1")
        .bind(market_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    let total_payout: Decimal = payouts.iter().map(|p| p.amount).sum();
    let winner_count = payouts.iter().filter(|p| p.amount > Decimal::ZERO).count();
    info!(
        %market_id,
        %winning_outcome_id,
        cancelled_orders = open_orders.len(),
        %total_payout,
        winner_count,
        "market resolved"
    );

    Ok(ResolveSummary {
        market_id,
        winning_outcome_id,
        payouts,
        total_payout,
        winner_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use sqlx::types::Json;
    use std::collections::HashMap;

    fn position(holdings: HashMap<Uuid, Decimal>) -> Position {
        Position {
            id: Uuid::new_v4(),
            user_id: "u1".to_string(),
            market_id: Uuid::new_v4(),
            holdings: Json(holdings),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_winning_payout_pays_winner_only() {
        let winner = Uuid::new_v4();
        let loser = Uuid::new_v4();
        let mut holdings = HashMap::new();
        holdings.insert(winner, dec!(10));
        holdings.insert(loser, dec!(25));
        assert_eq!(winning_payout(&position(holdings), winner), dec!(10));
    }

    #[test]
    fn test_winning_payout_settles_shorts_as_liability() {
        let winner = Uuid::new_v4();
        let mut holdings = HashMap::new();
        holdings.insert(winner, dec!(-10));
        assert_eq!(winning_payout(&position(holdings), winner), dec!(-10));
    }

    #[test]
    fn test_winning_payout_rounds_fractional_holdings() {
        let winner = Uuid::new_v4();
        let mut holdings = HashMap::new();
        holdings.insert(winner, dec!(10) * dec!(0.55) / dec!(1.05));
        assert_eq!(winning_payout(&position(holdings), winner), dec!(5.23809524));
    }

    #[test]
    fn test_winning_payout_zero_when_not_holding() {
        assert_eq!(
            winning_payout(&position(HashMap::new()), Uuid::new_v4()),
            Decimal::ZERO
        );
    }
}
