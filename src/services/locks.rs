//! Per-market serialisation.
//!
//! All mutations of one market run under its row-level database lock; this
//! in-process registry additionally queues concurrent submissions for the
//! same market so they wait on a mutex instead of piling onto the row lock.
//! Operations on different markets proceed in parallel.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct MarketLocks {
    inner: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl MarketLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the serialisation guard for a market, creating it on first use.
    pub async fn acquire(&self, market_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = self
            .inner
            .entry(market_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }
}
