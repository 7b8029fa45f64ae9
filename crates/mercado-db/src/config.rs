//! Engine configuration.
//!
//! Configuration is loaded from environment variables with fallback to
//! defaults. Binaries call `dotenvy::dotenv()` first so a local `.env` file
//! works too.
//!
//! | Variable                          | Default        |
//! |-----------------------------------|----------------|
//! | `MERCADO_DB_PATH`                 | `./mercado.db` |
//! | `MERCADO_DB_MAX_CONNECTIONS`      | `5`            |
//! | `MERCADO_DB_CONNECT_TIMEOUT_SECS` | `30`           |
//! | `MERCADO_SALES_PAGE_LIMIT`        | `100`          |

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::pool::DbConfig;

/// Default `tracing` filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,mercado=debug,sqlx=warn";

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Pool acquire timeout in seconds
    pub connect_timeout_secs: u64,

    /// Rows returned by `list_sales` when the filter sets no limit
    pub sales_page_limit: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            database_path: PathBuf::from("./mercado.db"),
            max_connections: 5,
            connect_timeout_secs: 30,
            sales_page_limit: 100,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup (environment, a map in tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = EngineConfig::default();

        let config = EngineConfig {
            database_path: lookup("MERCADO_DB_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),

            max_connections: parse_or(&lookup, "MERCADO_DB_MAX_CONNECTIONS", defaults.max_connections)?,

            connect_timeout_secs: parse_or(
                &lookup,
                "MERCADO_DB_CONNECT_TIMEOUT_SECS",
                defaults.connect_timeout_secs,
            )?,

            sales_page_limit: parse_or(&lookup, "MERCADO_SALES_PAGE_LIMIT", defaults.sales_page_limit)?,
        };

        if config.max_connections == 0 {
            return Err(ConfigError::InvalidValue("MERCADO_DB_MAX_CONNECTIONS".to_string()));
        }
        if config.sales_page_limit <= 0 {
            return Err(ConfigError::InvalidValue("MERCADO_SALES_PAGE_LIMIT".to_string()));
        }

        Ok(config)
    }

    /// Pool settings derived from this configuration.
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone())
            .max_connections(self.max_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` wins when set; otherwise [`DEFAULT_LOG_FILTER`].
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    // A second call (tests, embedding apps) keeps the first subscriber.
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
