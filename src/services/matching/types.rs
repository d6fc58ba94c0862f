//! Matching engine input and output types.
//!
//! The engine is a pure function over a snapshot of one market's resting
//! orders and positions; these types are that snapshot and the resulting
//! delta set the settlement applier commits in a single transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{Execution, Order, OrderSide};

/// A resting order as the engine sees it.
#[derive(Debug, Clone)]
pub struct BookOrder {
    pub id: Uuid,
    pub user_id: String,
    pub outcome_id: Uuid,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: Decimal,
    pub escrow_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for BookOrder {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id.clone(),
            outcome_id: order.outcome_id,
            side: order.side,
            quantity: order.quantity,
            price: order.price,
            escrow_amount: order.escrow_amount,
            created_at: order.created_at,
        }
    }
}

/// One user's holdings in the market being matched.
#[derive(Debug, Clone)]
pub struct MarketPosition {
    pub user_id: String,
    pub holdings: HashMap<Uuid, Decimal>,
}

/// Full snapshot of one market's matching-relevant state.
#[derive(Debug, Clone)]
pub struct MarketState {
    pub market_id: Uuid,
    pub outcome_ids: Vec<Uuid>,
    pub orders: Vec<BookOrder>,
    pub positions: Vec<MarketPosition>,
}

impl MarketState {
    /// Check the input invariant the engine relies on: the per-outcome sum
    /// of holdings across users is identical for every outcome (each equals
    /// the number of baskets ever minted). A violation is a caller bug.
    pub fn validate(&self) -> Result<(), String> {
        let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
        for position in &self.positions {
            for (outcome_id, quantity) in &position.holdings {
                *totals.entry(*outcome_id).or_default() += *quantity;
            }
        }
        let reference = self
            .outcome_ids
            .first()
            .map(|id| totals.get(id).copied().unwrap_or_default())
            .unwrap_or_default();
        for outcome_id in &self.outcome_ids {
            let total = totals.get(outcome_id).copied().unwrap_or_default();
            if total != reference {
                return Err(format!(
                    "basket conservation violated in market {}: outcome {} totals {}, expected {}",
                    self.market_id, outcome_id, total, reference
                ));
            }
        }
        Ok(())
    }
}

/// New remaining quantity and escrow for a touched order. Zero quantity
/// means the settlement applier deletes the row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderUpdate {
    pub order_id: Uuid,
    pub new_quantity: i64,
    pub new_escrow: Decimal,
}

/// Signed change to one user's holding of one outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    pub user_id: String,
    pub outcome_id: Uuid,
    pub quantity_delta: Decimal,
}

/// Signed change to one user's balance and locked escrow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceUpdate {
    pub user_id: String,
    pub balance_delta: Decimal,
    pub locked_delta: Decimal,
}

/// Everything a matching pass produced. Applied atomically or not at all.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    pub executions: Vec<Execution>,
    pub order_updates: Vec<OrderUpdate>,
    pub position_updates: Vec<PositionUpdate>,
    pub balance_updates: Vec<BalanceUpdate>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.executions.is_empty()
    }
}
