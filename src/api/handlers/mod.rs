//! HTTP handlers for the exchange API.

pub mod account;
pub mod market;
pub mod order;

use std::future::Future;
use std::time::Duration;

use crate::error::ExchangeError;

/// Run a mutating operation under the configured timeout. On expiry the
/// underlying transaction is dropped and rolled back, so the caller can
/// retry against unchanged state.
pub(crate) async fn with_timeout<T>(
    secs: u64,
    operation: impl Future<Output = Result<T, ExchangeError>>,
) -> Result<T, ExchangeError> {
    match tokio::time::timeout(Duration::from_secs(secs), operation).await {
        Ok(result) => result,
        Err(_) => Err(ExchangeError::Timeout),
    }
}

/// Serialize timestamps as epoch milliseconds in API responses.
pub(crate) mod datetime_as_millis {
    use chrono::{DateTime, Utc};
    use serde::Serializer;

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(dt.timestamp_millis())
    }
}
