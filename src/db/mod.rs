//! Database Module
//!
//! PostgreSQL connection pool management, tuned for many small exchange
//! transactions.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Connection acquisition timeout; short so a saturated pool fails fast.
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Create config from environment variables
    pub fn from_env(database_url: &str) -> Self {
        Self {
            url: database_url.to_string(),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            acquire_timeout_secs: std::env::var("DB_ACQUIRE_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
        }
    }
}

/// Database connection wrapper
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Connect with settings from the environment
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let config = DatabaseConfig::from_env(database_url);
        tracing::info!(
            "Connecting to database with pool config: max={}, min={}, acquire_timeout={}s",
            config.max_connections,
            config.min_connections,
            config.acquire_timeout_secs
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .test_before_acquire(true)
            .connect(&config.url)
            .await?;

        tracing::info!(
            "Database pool established: size={}, idle={}",
            pool.size(),
            pool.num_idle()
        );

        Ok(Self { pool })
    }

    /// Check if database is healthy
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_defaults() {
        let config = DatabaseConfig::from_env("postgres://localhost/predex");
        assert!(config.max_connections >= config.min_connections);
        assert!(config.acquire_timeout_secs > 0);
    }
}
