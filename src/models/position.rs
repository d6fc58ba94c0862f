//! Contract holdings per user and market.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::HashMap;
use uuid::Uuid;

/// Holdings of one user in one market, keyed by outcome id.
///
/// Quantities are decimals: basket-surplus distribution can hand out
/// fractional contracts, and shorts are literal negative values. Entries that
/// reach exactly zero are pruned from the map.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub id: Uuid,
    pub user_id: String,
    pub market_id: Uuid,
    pub holdings: Json<HashMap<Uuid, Decimal>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Holding of a single outcome, zero when absent.
    pub fn holding_of(&self, outcome_id: Uuid) -> Decimal {
        self.holdings
            .get(&outcome_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }
}
