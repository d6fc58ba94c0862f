//! Post-settlement invariant audit.
//!
//! Basket conservation and the per-user escrow ledger are checked after every
//! settlement, before commit. A violation means the exchange is corrupting
//! money; the process must stop serving rather than continue.

use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

/// Verify invariants for a market and the users a settlement touched.
/// Aborts the process on violation.
pub async fn enforce(
    tx: &mut Transaction<'_, Postgres>,
    market_id: Uuid,
    user_ids: &[String],
) -> Result<(), sqlx::Error> {
    if let Some(violation) = check(tx, market_id, user_ids).await? {
        tracing::error!(%market_id, violation, "invariant violated after settlement; aborting");
        std::process::abort();
    }
    Ok(())
}

async fn check(
    tx: &mut Transaction<'_, Postgres>,
    market_id: Uuid,
    user_ids: &[String],
) -> Result<Option<String>, sqlx::Error> {
    // Basket conservation: every outcome's holding total equals the number
    // of baskets ever minted for the market.
    let outcome_ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM outcomes WHERE market_id = $1")
        .bind(market_id)
        .fetch_all(&mut **tx)
        .await?;
    let holdings: Vec<(Json<HashMap<Uuid, Decimal>>,)> =
        sqlx::query_as("SELECT holdings FROM positions WHERE market_id = $1")
            .bind(market_id)
            .fetch_all(&mut **tx)
            .await?;

    let mut totals: HashMap<Uuid, Decimal> = HashMap::new();
    for (Json(map),) in &holdings {
        for (outcome_id, quantity) in map {
            *totals.entry(*outcome_id).or_default() += *quantity;
        }
    }
    let reference = outcome_ids
        .first()
        .map(|id| totals.get(id).copied().unwrap_or_default())
        .unwrap_or_default();
    for outcome_id in &outcome_ids {
        let total = totals.get(outcome_id).copied().unwrap_or_default();
        if total != reference {
            return Ok(Some(format!(
                "outcome {} holds {} in total, expected {}",
                outcome_id, total, reference
            )));
        }
    }

    // Ledger invariants for every user the settlement touched:
    // 0 <= locked <= balance and locked equals the escrow of their orders.
    let rows: Vec<(String, Decimal, Decimal, Decimal)> = sqlx::query_as(
        "SELECT u.id, u.balance, u.locked, \
                COALESCE((SELECT SUM(o.escrow_amount) FROM orders o WHERE o.user_id = u.id), 0) \
         FROM users u WHERE u.id = ANY($1)",
    )
    .bind(user_ids)
    .fetch_all(&mut **tx)
    .await?;

    for (user_id, balance, locked, escrow_sum) in rows {
        if locked < Decimal::ZERO || balance < locked {
            return Ok(Some(format!(
                "user {} ledger out of range: balance {}, locked {}",
                user_id, balance, locked
            )));
        }
        if locked != escrow_sum {
            return Ok(Some(format!(
                "user {} locked {} diverges from order escrow {}",
                user_id, locked, escrow_sum
            )));
        }
    }

    Ok(None)
}
