use anyhow::Context;
use config::{Config, Environment, File};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Loads configuration from a given config file or environment variables.
pub fn load_config(config_file_path: Option<&Path>) -> anyhow::Result<AppConfig> {
    // Load .env file if it exists, ignore if not present
    dotenv().ok();

    let mut settings = Config::builder();

    if let Some(path) = config_file_path {
        settings = settings.add_source(File::from(path).required(true));
    }

    // Environment variables with prefix WITHDRAWAL_LEDGER, e.g.
    // WITHDRAWAL_LEDGER__LEDGER__ENFORCE_QUORUM=true
    settings = settings.add_source(
        Environment::with_prefix("WITHDRAWAL_LEDGER")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    let app_config = settings
        .build()?
        .try_deserialize::<AppConfig>()
        .context("Invalid withdrawal ledger configuration")?;

    Ok(app_config)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ledger: LedgerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { max_connections: 10 }
    }
}

impl DatabaseConfig {
    pub fn get_db_url(&self) -> anyhow::Result<String> {
        std::env::var("DATABASE_URL")
            .context("DATABASE_URL is not set in environment or .env file")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Reject `BROADCAST` until the quorum of distinct signatures is present.
    pub enforce_quorum: bool,
    pub operation_timeout_ms: Option<u64>,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            enforce_quorum: false,
            operation_timeout_ms: None,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl LedgerConfig {
    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String, // "debug" | "info" | "warn" | "error"
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
