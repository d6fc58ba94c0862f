//! Append-only execution records. Purely audit; never read back by the
//! matching path.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// How a match was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "execution_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExecutionKind {
    /// A buy and a sell on the same outcome crossed.
    Direct,
    /// Bids across distinct outcomes summed to at least 1.00 and minted
    /// complete baskets.
    Synthetic,
}

/// One party's slice of an execution.
///
/// `quantity` is signed: positive for contracts received, negative for
/// contracts delivered. `effective_price` is what the participant paid or
/// received per headline contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionParticipant {
    pub user_id: String,
    pub outcome_id: Uuid,
    pub quantity: Decimal,
    pub effective_price: Decimal,
}

/// A recorded match.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Execution {
    pub id: Uuid,
    pub market_id: Uuid,
    pub kind: ExecutionKind,
    pub executed_at: DateTime<Utc>,
    pub participants: Json<Vec<ExecutionParticipant>>,
}
