//! Order matching for prediction markets.
//!
//! The engine itself is a pure function: the caller snapshots one market's
//! resting orders and positions inside a transaction, runs [`engine::execute`]
//! and hands the resulting delta set to the settlement applier. Keeping the
//! engine free of I/O makes it unit-testable in isolation and lets the whole
//! match settle atomically.

pub mod engine;
mod types;

pub use types::{
    BalanceUpdate, BookOrder, MarketPosition, MarketState, MatchResult, OrderUpdate,
    PositionUpdate,
};
