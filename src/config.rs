//! Configuration system for Argus.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `ARGUS_SERVER_HOST` - Server bind address
//! - `ARGUS_SERVER_PORT` - Server port
//! - `ARGUS_CHAT_ACCESS_TOKEN` - Bearer token for the chat push API
//! - `ARGUS_CHAT_API_BASE` - Base URL of the chat push API
//! - `ARGUS_RECONCILE_CRON` - Cron expression for the reconciliation cycle
//! - `ARGUS_NEAR_EXPIRY_DAYS` - Near-expiry reminder window in days
//! - `ARGUS_DATABASE_TYPE` - Database type ("sqlite" or "postgres")
//! - `ARGUS_DATABASE_URL` - Database connection URL
//! - `ARGUS_LOGGING_ENABLED` - Enable log output
//! - `ARGUS_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{AccountError, AccountResult};

/// Global configuration singleton.
static CONFIG: OnceLock<ArgusConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArgusConfig {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Chat push API configuration
    pub chat: ChatConfig,
    /// Reconciliation job configuration
    pub reconcile: ReconcileConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
        }
    }
}

/// Chat push API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Bearer token presented to the push API (use the environment variable
    /// in production; never commit it to `config.toml`)
    pub access_token: String,
    /// Base URL of the push API
    pub api_base: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_base: "https://api.line.me".to_string(),
        }
    }
}

/// Reconciliation job configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Cron expression for the reconciliation cycle (default: every 5 minutes).
    /// The notification dedup contract holds regardless of the period chosen.
    pub cron: String,
    /// Lead time before expiry during which daily reminders go out, in days
    pub near_expiry_days: i64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            // Every 5 minutes
            cron: "0 */5 * * * *".to_string(),
            near_expiry_days: 3,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database type: "sqlite" or "postgres"
    pub db_type: String,
    /// SQLite connection URL
    pub sqlite_url: String,
    /// PostgreSQL connection URL
    pub postgres_url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            db_type: "sqlite".to_string(),
            sqlite_url: "sqlite://argus.db".to_string(),
            postgres_url: "postgres://localhost/argus".to_string(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
        }
    }
}

impl ArgusConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> AccountResult<Self> {
        let builder = Config::builder()
            // Start with defaults
            .set_default("server.host", "127.0.0.1")
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("server.port", 4000)
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("chat.access_token", "")
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("chat.api_base", "https://api.line.me")
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("reconcile.cron", "0 */5 * * * *")
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("reconcile.near_expiry_days", 3)
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("database.db_type", "sqlite")
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("database.sqlite_url", "sqlite://argus.db")
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("database.postgres_url", "postgres://localhost/argus")
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("logging.enabled", true)
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| AccountError::Config(e.to_string()))?
            // Load from config.toml (optional)
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option("server.host", env::var("ARGUS_SERVER_HOST").ok())
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option(
                "server.port",
                env::var("ARGUS_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option(
                "chat.access_token",
                env::var("ARGUS_CHAT_ACCESS_TOKEN").ok(),
            )
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option("chat.api_base", env::var("ARGUS_CHAT_API_BASE").ok())
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option("reconcile.cron", env::var("ARGUS_RECONCILE_CRON").ok())
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option(
                "reconcile.near_expiry_days",
                env::var("ARGUS_NEAR_EXPIRY_DAYS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option("database.db_type", env::var("ARGUS_DATABASE_TYPE").ok())
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option(
                "database.sqlite_url",
                env::var("ARGUS_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("sqlite")),
            )
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option(
                "database.postgres_url",
                env::var("ARGUS_DATABASE_URL")
                    .ok()
                    .filter(|url| url.starts_with("postgres")),
            )
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option(
                "logging.enabled",
                env::var("ARGUS_LOGGING_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| AccountError::Config(e.to_string()))?
            .set_override_option("logging.level", env::var("ARGUS_LOG_LEVEL").ok())
            .map_err(|e| AccountError::Config(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| AccountError::Config(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| AccountError::Config(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AccountResult<()> {
        if self.server.port == 0 {
            return Err(AccountError::Config(
                "server.port must be greater than 0".to_string(),
            ));
        }

        match self.database.db_type.as_str() {
            "sqlite" | "postgres" => {}
            other => {
                return Err(AccountError::Config(format!(
                    "database.db_type must be 'sqlite' or 'postgres', got '{other}'"
                )));
            }
        }

        if self.chat.api_base.is_empty() {
            return Err(AccountError::Config(
                "chat.api_base cannot be empty".to_string(),
            ));
        }

        if self.reconcile.cron.is_empty() {
            return Err(AccountError::Config(
                "reconcile.cron cannot be empty".to_string(),
            ));
        }
        if self.reconcile.near_expiry_days <= 0 {
            return Err(AccountError::Config(
                "reconcile.near_expiry_days must be greater than 0".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(AccountError::Config(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// This loads the configuration on first access and caches it.
/// Returns an error if configuration loading or validation fails.
pub fn get_config() -> AccountResult<&'static ArgusConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = ArgusConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value came from the same
    // sources, so just return whatever is cached.
    let _ = CONFIG.set(config);
    CONFIG
        .get()
        .ok_or_else(|| AccountError::Config("configuration cache unavailable".to_string()))
}
