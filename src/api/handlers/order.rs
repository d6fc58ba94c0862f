//! Order endpoints: submission (which triggers a matching pass) and
//! cancellation.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::{datetime_as_millis, with_timeout};
use crate::error::ExchangeError;
use crate::models::{Execution, ExecutionKind, ExecutionParticipant, OrderSide};
use crate::services::admission::{self, OrderPlacement, OrderRequest};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub user_id: String,
    pub market_id: Uuid,
    pub outcome_id: Uuid,
    pub side: OrderSide,
    pub quantity: i64,
    pub price: Decimal,
}

#[derive(Debug, Serialize)]
pub struct ExecutionView {
    pub id: Uuid,
    pub kind: ExecutionKind,
    #[serde(serialize_with = "datetime_as_millis::serialize")]
    pub executed_at: DateTime<Utc>,
    pub participants: Vec<ExecutionParticipant>,
}

impl From<Execution> for ExecutionView {
    fn from(execution: Execution) -> Self {
        Self {
            id: execution.id,
            kind: execution.kind,
            executed_at: execution.executed_at,
            participants: execution.participants.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order_id: Uuid,
    pub market_id: Uuid,
    pub outcome_id: Uuid,
    pub side: OrderSide,
    pub price: Decimal,
    pub quantity: i64,
    pub remaining_quantity: i64,
    pub escrow_amount: Decimal,
    pub status: &'static str,
    #[serde(serialize_with = "datetime_as_millis::serialize")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct CreateOrderResponse {
    pub order: OrderView,
    pub executions: Vec<ExecutionView>,
}

impl From<OrderPlacement> for CreateOrderResponse {
    fn from(placement: OrderPlacement) -> Self {
        let admitted = placement.admitted;
        let remaining = placement
            .resting
            .as_ref()
            .map(|o| o.quantity)
            .unwrap_or(0);
        let escrow = placement
            .resting
            .as_ref()
            .map(|o| o.escrow_amount)
            .unwrap_or(Decimal::ZERO);
        let status = if remaining == admitted.quantity {
            "open"
        } else if remaining == 0 {
            "filled"
        } else {
            "partially_filled"
        };
        Self {
            order: OrderView {
                order_id: admitted.id,
                market_id: admitted.market_id,
                outcome_id: admitted.outcome_id,
                side: admitted.side,
                price: admitted.price,
                quantity: admitted.quantity,
                remaining_quantity: remaining,
                escrow_amount: escrow,
                status,
                created_at: admitted.created_at,
            },
            executions: placement.executions.into_iter().map(Into::into).collect(),
        }
    }
}

/// POST /orders
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<CreateOrderResponse>, ExchangeError> {
    let placement = with_timeout(
        state.config.operation_timeout_secs,
        admission::create_order(
            &state.db.pool,
            &state.locks,
            state.config.max_order_quantity,
            OrderRequest {
                user_id: request.user_id,
                market_id: request.market_id,
                outcome_id: request.outcome_id,
                side: request.side,
                quantity: request.quantity,
                price: request.price,
            },
        ),
    )
    .await?;
    Ok(Json(placement.into()))
}

#[derive(Debug, Deserialize)]
pub struct CancelOrderQuery {
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct CancelOrderResponse {
    pub order_id: Uuid,
    pub market_id: Uuid,
    pub refunded_escrow: Decimal,
}

/// DELETE /orders/:market_id?user_id=...
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(market_id): Path<Uuid>,
    Query(query): Query<CancelOrderQuery>,
) -> Result<Json<CancelOrderResponse>, ExchangeError> {
    let order = with_timeout(
        state.config.operation_timeout_secs,
        admission::cancel_order(&state.db.pool, &state.locks, &query.user_id, market_id),
    )
    .await?;
    Ok(Json(CancelOrderResponse {
        order_id: order.id,
        market_id: order.market_id,
        refunded_escrow: order.escrow_amount,
    }))
}
