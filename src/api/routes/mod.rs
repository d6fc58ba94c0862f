use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;

use crate::api::handlers;
use crate::AppState;

pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        // Markets
        .route(
            "/markets",
            post(handlers::market::create_market).get(handlers::market::list_markets),
        )
        .route("/markets/:market_id", get(handlers::market::get_market))
        .route("/markets/:market_id/book", get(handlers::market::get_book))
        .route(
            "/markets/:market_id/executions",
            get(handlers::market::get_executions),
        )
        .route(
            "/markets/:market_id/execute",
            post(handlers::market::execute_market),
        )
        .route(
            "/markets/:market_id/resolve",
            post(handlers::market::resolve_market),
        )
        // Orders
        .route("/orders", post(handlers::order::create_order))
        .route("/orders/:market_id", delete(handlers::order::cancel_order))
        // Accounts
        .route(
            "/account/:user_id/balance",
            get(handlers::account::get_balance),
        )
        .route(
            "/account/:user_id/positions",
            get(handlers::account::get_positions),
        )
        .route(
            "/account/:user_id/orders",
            get(handlers::account::get_orders),
        )
        .route("/account/:user_id/credit", post(handlers::account::credit))
}
