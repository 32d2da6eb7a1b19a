//! API configuration

use serde::Deserialize;

/// API configuration
///
/// Every field can be set through the environment with the `API_` prefix,
/// e.g. `API_PORT=8080` or `API_SWEEP_INTERVAL_SECS=900`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// JWT secret for authentication
    pub jwt_secret: String,
    /// JWT expiration in seconds
    pub jwt_expiration_secs: u64,
    /// Database URL
    pub database_url: String,
    /// Log level
    pub log_level: String,
    /// Seconds between scheduled escalation sweeps; 0 disables the loop
    pub sweep_interval_secs: u64,
    /// Open files fetched per sweep batch
    pub sweep_batch_size: i64,
    /// Trailing window of the corbeille completed bucket, in days
    pub corbeille_window_days: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: "change-me-in-production".to_string(),
            jwt_expiration_secs: 3600,
            database_url: "postgres://localhost/bordereau".to_string(),
            log_level: "info".to_string(),
            sweep_interval_secs: 3600,
            sweep_batch_size: domain_dispatch::DEFAULT_SWEEP_BATCH,
            corbeille_window_days: domain_dispatch::COMPLETED_WINDOW_DAYS,
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::Environment::with_prefix("API"))
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
