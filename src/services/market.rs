//! Market lifecycle and read queries.
//!
//! Creation assigns stable ids and the human-facing market number; reads are
//! plain queries that never join the matching transaction.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::error::ExchangeError;
use crate::models::{
    Execution, Market, MarketStatus, MarketWithOutcomes, Order, Outcome, Position, User,
};

#[derive(Debug, Clone)]
pub struct CreateMarketRequest {
    pub guild_id: String,
    pub creator_id: String,
    pub oracle_user_id: String,
    pub description: String,
    pub outcome_descriptions: Vec<String>,
}

pub fn validate_create(request: &CreateMarketRequest) -> Result<(), ExchangeError> {
    if request.description.trim().is_empty() {
        return Err(ExchangeError::InvalidParameters(
            "market description must not be empty".to_string(),
        ));
    }
    if request.oracle_user_id.trim().is_empty() {
        return Err(ExchangeError::InvalidParameters(
            "oracle user id must not be empty".to_string(),
        ));
    }
    if request.outcome_descriptions.len() < 2 {
        return Err(ExchangeError::InvalidParameters(format!(
            "a market needs at least 2 outcomes, got {}",
            request.outcome_descriptions.len()
        )));
    }
    if request
        .outcome_descriptions
        .iter()
        .any(|d| d.trim().is_empty())
    {
        return Err(ExchangeError::InvalidParameters(
            "outcome descriptions must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Create a market and its outcomes, numbered 1..N.
pub async fn create_market(
    pool: &PgPool,
    request: CreateMarketRequest,
) -> Result<MarketWithOutcomes, ExchangeError> {
    validate_create(&request)?;
    let mut tx = pool.begin().await?;

    let market: Market = sqlx::query_as(
        "INSERT INTO markets (id, guild_id, creator_id, description, oracle_user_id) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(&request.guild_id)
    .bind(&request.creator_id)
    .bind(&request.description)
    .bind(&request.oracle_user_id)
    .fetch_one(&mut *tx)
    .await?;

    let mut outcomes = Vec::with_capacity(request.outcome_descriptions.len());
    for (index, description) in request.outcome_descriptions.iter().enumerate() {
        let outcome: Outcome = sqlx::query_as(
            "INSERT INTO outcomes (id, market_id, number, description) \
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(market.id)
        .bind(index as i32 + 1)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;
        outcomes.push(outcome);
    }

    tx.commit().await?;

    info!(
        market_id = %market.id,
        number = market.number,
        outcomes = outcomes.len(),
        "market created"
    );
    Ok(MarketWithOutcomes { market, outcomes })
}

/// Paginated market listing, optionally filtered by status.
pub async fn list_markets(
    pool: &PgPool,
    status: Option<MarketStatus>,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Market>, i64), ExchangeError> {
    let limit = limit.clamp(1, 100);
    let offset = offset.max(0);

    let (markets, total) = match status {
        Some(status) => {
            let markets: Vec<Market> = sqlx::query_as(
                "SELECT * FROM markets WHERE status = $1 ORDER BY number DESC LIMIT $2 OFFSET $3",
            )
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await?;
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM markets WHERE status = $1")
                .bind(status)
                .fetch_one(pool)
                .await?;
            (markets, total)
        }
        None => {
            let markets: Vec<Market> =
                sqlx::query_as("SELECT * FROM markets ORDER BY number DESC LIMIT $1 OFFSET $2")
                    .bind(limit)
                    .bind(offset)
                    .fetch_all(pool)
                    .await?;
            let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM markets")
                .fetch_one(pool)
                .await?;
            (markets, total)
        }
    };
    Ok((markets, total))
}

pub async fn get_market(
    pool: &PgPool,
    market_id: Uuid,
) -> Result<Option<MarketWithOutcomes>, ExchangeError> {
    let market: Option<Market> = sqlx::query_as("SELECT * FROM markets WHERE id = $1")
        .bind(market_id)
        .fetch_optional(pool)
        .await?;
    let Some(market) = market else {
        return Ok(None);
    };
    let outcomes: Vec<Outcome> =
        sqlx::query_as("SELECT * FROM outcomes WHERE market_id = $1 ORDER BY number")
            .bind(market_id)
            .fetch_all(pool)
            .await?;
    Ok(Some(MarketWithOutcomes { market, outcomes }))
}

/// One aggregated price level of the book.
#[derive(Debug, Clone, Serialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub quantity: i64,
}

/// Resting depth for one outcome: bids best-first, asks best-first.
#[derive(Debug, Clone, Serialize)]
pub struct OutcomeBook {
    pub outcome_id: Uuid,
    pub number: i32,
    pub description: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketBook {
    pub market_id: Uuid,
    pub outcomes: Vec<OutcomeBook>,
}

/// Aggregated order-book view of a market.
pub async fn order_book(pool: &PgPool, market_id: Uuid) -> Result<Option<MarketBook>, ExchangeError> {
    let outcomes: Vec<Outcome> =
        sqlx::query_as("SELECT * FROM outcomes WHERE market_id = $1 ORDER BY number")
            .bind(market_id)
            .fetch_all(pool)
            .await?;
    if outcomes.is_empty() {
        return Ok(None);
    }

    let levels: Vec<(Uuid, String, Decimal, i64)> = sqlx::query_as(
        "SELECT outcome_id, side::text, price, SUM(quantity)::BIGINT \
         FROM orders WHERE market_id = $1 \
         GROUP BY outcome_id, side, price",
    )
    .bind(market_id)
    .fetch_all(pool)
    .await?;

    let mut books: Vec<OutcomeBook> = outcomes
        .into_iter()
        .map(|outcome| OutcomeBook {
            outcome_id: outcome.id,
            number: outcome.number,
            description: outcome.description,
            bids: Vec::new(),
            asks: Vec::new(),
        })
        .collect();

    for (outcome_id, side, price, quantity) in levels {
        let Some(book) = books.iter_mut().find(|b| b.outcome_id == outcome_id) else {
            continue;
        };
        let level = BookLevel { price, quantity };
        if side == "buy" {
            book.bids.push(level);
        } else {
            book.asks.push(level);
        }
    }
    for book in &mut books {
        book.bids.sort_by(|a, b| b.price.cmp(&a.price));
        book.asks.sort_by(|a, b| a.price.cmp(&b.price));
    }

    Ok(Some(MarketBook {
        market_id,
        outcomes: books,
    }))
}

/// Most recent executions of a market.
pub async fn market_executions(
    pool: &PgPool,
    market_id: Uuid,
    limit: i64,
) -> Result<Vec<Execution>, ExchangeError> {
    let limit = limit.clamp(1, 200);
    let executions: Vec<Execution> = sqlx::query_as(
        "SELECT * FROM executions WHERE market_id = $1 ORDER BY executed_at DESC, id LIMIT $2",
    )
    .bind(market_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(executions)
}

pub async fn user_orders(pool: &PgPool, user_id: &str) -> Result<Vec<Order>, ExchangeError> {
    let orders: Vec<Order> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(orders)
}

pub async fn user_positions(pool: &PgPool, user_id: &str) -> Result<Vec<Position>, ExchangeError> {
    let positions: Vec<Position> =
        sqlx::query_as("SELECT * FROM positions WHERE user_id = $1 ORDER BY created_at")
            .bind(user_id)
            .fetch_all(pool)
            .await?;
    Ok(positions)
}

pub async fn get_user(pool: &PgPool, user_id: &str) -> Result<Option<User>, ExchangeError> {
    let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

/// Credit spendable balance. This is the interface the external balance
/// seeder calls; the exchange itself never creates currency elsewhere.
pub async fn credit_user(
    pool: &PgPool,
    user_id: &str,
    amount: Decimal,
) -> Result<User, ExchangeError> {
    if user_id.trim().is_empty() {
        return Err(ExchangeError::InvalidParameters(
            "user id must not be empty".to_string(),
        ));
    }
    if amount <= Decimal::ZERO {
        return Err(ExchangeError::InvalidParameters(format!(
            "credit amount must be positive, got {}",
            amount
        )));
    }

    sqlx::query("INSERT INTO users (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
        .bind(user_id)
        .execute(pool)
        .await?;
    let user: User =
        sqlx::query_as("UPDATE users SET balance = balance + $1 WHERE id = $2 RETURNING *")
            .bind(amount)
            .bind(user_id)
            .fetch_one(pool)
            .await?;

    info!(user_id, %amount, "balance credited");
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(outcomes: Vec<&str>) -> CreateMarketRequest {
        CreateMarketRequest {
            guild_id: "g1".to_string(),
            creator_id: "creator".to_string(),
            oracle_user_id: "oracle".to_string(),
            description: "Who wins the race?".to_string(),
            outcome_descriptions: outcomes.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn test_create_requires_two_outcomes() {
        assert!(validate_create(&request(vec!["Yes"])).is_err());
        assert!(validate_create(&request(vec![])).is_err());
        assert!(validate_create(&request(vec!["Yes", "No"])).is_ok());
        assert!(validate_create(&request(vec!["A", "B", "C"])).is_ok());
    }

    #[test]
    fn test_create_rejects_blank_fields() {
        let mut req = request(vec!["Yes", "No"]);
        req.description = " ".to_string();
        assert!(validate_create(&req).is_err());

        let mut req = request(vec!["Yes", ""]);
        req.description = "ok".to_string();
        assert!(validate_create(&req).is_err());
    }
}
