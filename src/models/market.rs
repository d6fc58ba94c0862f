//! Market and outcome models.
//!
//! A market is a set of mutually exclusive outcomes. One complete set of
//! outcome contracts (a basket) is always redeemable for exactly 1.00.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Market status. Mutates exactly once, open -> resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "market_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Resolved,
}

impl MarketStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, MarketStatus::Open)
    }
}

impl std::fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarketStatus::Open => write!(f, "open"),
            MarketStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// A prediction market.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Market {
    pub id: Uuid,

    /// Human-facing monotone number, unique per exchange.
    pub number: i64,

    pub guild_id: String,
    pub creator_id: String,
    pub description: String,

    /// The user trusted to declare the winning outcome.
    pub oracle_user_id: String,

    pub status: MarketStatus,
    pub winning_outcome_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

/// One outcome of a market. Created with the market, immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Outcome {
    pub id: Uuid,
    pub market_id: Uuid,

    /// 1-indexed within the market.
    pub number: i32,

    pub description: String,
}

/// Market together with its outcomes, as returned by create/get.
#[derive(Debug, Clone, Serialize)]
pub struct MarketWithOutcomes {
    #[serde(flatten)]
    pub market: Market,
    pub outcomes: Vec<Outcome>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_status_is_open() {
        assert!(MarketStatus::Open.is_open());
        assert!(!MarketStatus::Resolved.is_open());
    }

    #[test]
    fn test_market_status_display() {
        assert_eq!(MarketStatus::Open.to_string(), "open");
        assert_eq!(MarketStatus::Resolved.to_string(), "resolved");
    }
}
