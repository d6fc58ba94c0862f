use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_port")]
    pub port: u16,

    pub database_url: String,

    /// Upper bound on a single order's quantity.
    #[serde(default = "default_max_order_quantity")]
    pub max_order_quantity: i64,

    /// Timeout for mutating operations; on expiry the transaction rolls
    /// back and the caller may retry.
    #[serde(default = "default_operation_timeout")]
    pub operation_timeout_secs: u64,
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_order_quantity() -> i64 {
    1000
}

fn default_operation_timeout() -> u64 {
    10
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::default())
            .build()?;

        let app_config: AppConfig = config.try_deserialize()?;
        Ok(app_config)
    }
}
