//! Market endpoints: lifecycle, resolution and read views.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{order::ExecutionView, with_timeout};
use crate::error::ExchangeError;
use crate::models::{Market, MarketStatus, MarketWithOutcomes};
use crate::services::market::{self, CreateMarketRequest, MarketBook};
use crate::services::resolution::{self, ResolveSummary};
use crate::services::settlement;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateMarketBody {
    pub guild_id: String,
    pub creator_id: String,
    pub oracle_user_id: String,
    pub description: String,
    pub outcome_descriptions: Vec<String>,
}

/// POST /markets
pub async fn create_market(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateMarketBody>,
) -> Result<Json<MarketWithOutcomes>, ExchangeError> {
    let created = with_timeout(
        state.config.operation_timeout_secs,
        market::create_market(
            &state.db.pool,
            CreateMarketRequest {
                guild_id: body.guild_id,
                creator_id: body.creator_id,
                oracle_user_id: body.oracle_user_id,
                description: body.description,
                outcome_descriptions: body.outcome_descriptions,
            },
        ),
    )
    .await?;
    Ok(Json(created))
}

#[derive(Debug, Deserialize)]
pub struct ListMarketsQuery {
    pub status: Option<MarketStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct MarketsResponse {
    pub markets: Vec<Market>,
    pub total: i64,
}

/// GET /markets
pub async fn list_markets(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListMarketsQuery>,
) -> Result<Json<MarketsResponse>, ExchangeError> {
    let (markets, total) = market::list_markets(
        &state.db.pool,
        query.status,
        query.limit.unwrap_or(50),
        query.offset.unwrap_or(0),
    )
    .await?;
    Ok(Json(MarketsResponse { markets, total }))
}

/// GET /markets/:market_id
pub async fn get_market(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<MarketWithOutcomes>, ExchangeError> {
    market::get_market(&state.db.pool, market_id)
        .await?
        .map(Json)
        .ok_or_else(|| ExchangeError::InvalidParameters(format!("unknown market {}", market_id)))
}

/// GET /markets/:market_id/book
pub async fn get_book(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<MarketBook>, ExchangeError> {
    market::order_book(&state.db.pool, market_id)
        .await?
        .map(Json)
        .ok_or_else(|| ExchangeError::InvalidParameters(format!("unknown market {}", market_id)))
}

#[derive(Debug, Deserialize)]
pub struct ExecutionsQuery {
    pub limit: Option<i64>,
}

/// GET /markets/:market_id/executions
pub async fn get_executions(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<Vec<ExecutionView>>, ExchangeError> {
    let executions =
        market::market_executions(&state.db.pool, market_id, query.limit.unwrap_or(50)).await?;
    Ok(Json(executions.into_iter().map(Into::into).collect()))
}

/// POST /markets/:market_id/execute
///
/// Runs a fresh matching pass. Order submission already triggers one; this
/// is for hosts that want to re-drive a market explicitly, e.g. after
/// crediting balances.
pub async fn execute_market(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
) -> Result<Json<Vec<ExecutionView>>, ExchangeError> {
    let executions = with_timeout(
        state.config.operation_timeout_secs,
        settlement::execute_market(&state.db.pool, &state.locks, market_id),
    )
    .await?;
    Ok(Json(executions.into_iter().map(Into::into).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ResolveMarketBody {
    pub winning_outcome_id: Uuid,
    pub caller_user_id: String,
}

/// POST /markets/:market_id/resolve
pub async fn resolve_market(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Json(body): Json<ResolveMarketBody>,
) -> Result<Json<ResolveSummary>, ExchangeError> {
    let summary = with_timeout(
        state.config.operation_timeout_secs,
        resolution::resolve_market(
            &state.db.pool,
            &state.locks,
            market_id,
            body.winning_outcome_id,
            &body.caller_user_id,
        ),
    )
    .await?;
    Ok(Json(summary))
}
