//! Server configuration module.
//!
//! Layered with the `config` crate: built-in defaults, then
//! `config/optics.toml` (optional), then `OPTICS__*` environment variables.

use std::path::PathBuf;

use chrono::Duration;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use optics_db::DbConfig;

/// Default location of the optional TOML file.
pub const DEFAULT_CONFIG_FILE: &str = "config/optics";

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: PathBuf,

    /// Pool size
    pub max_connections: u32,

    /// Default tracing filter when `RUST_LOG` is unset
    pub log_level: String,

    /// Server-side lifetime of a session opened without "remember me".
    /// The cookie itself has no Max-Age and dies with the browser.
    pub browser_session_ttl_secs: i64,

    /// Lifetime of a "remember me" session and its cookie
    pub remember_session_ttl_secs: i64,

    /// Adds `Secure` to the session cookie
    pub cookie_secure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            database_path: PathBuf::from("data/optics.db"),
            max_connections: 5,
            log_level: "info".to_string(),
            browser_session_ttl_secs: 43_200,
            remember_session_ttl_secs: 1_209_600,
            cookie_secure: false,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the default file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load configuration with `file` (extension optional) as the middle layer.
    pub fn load_from(file: &str) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let config: ServerConfig = Config::builder()
            .set_default("host", defaults.host)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("database_path", defaults.database_path.display().to_string())?
            .set_default("max_connections", i64::from(defaults.max_connections))?
            .set_default("log_level", defaults.log_level)?
            .set_default("browser_session_ttl_secs", defaults.browser_session_ttl_secs)?
            .set_default("remember_session_ttl_secs", defaults.remember_session_ttl_secs)?
            .set_default("cookie_secure", defaults.cookie_secure)?
            .add_source(File::with_name(file).required(false))
            .add_source(Environment::with_prefix("OPTICS").separator("__").try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        if self.browser_session_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue("browser_session_ttl_secs".to_string()));
        }
        if self.remember_session_ttl_secs <= 0 {
            return Err(ConfigError::InvalidValue("remember_session_ttl_secs".to_string()));
        }
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database_path.clone()).max_connections(self.max_connections)
    }

    /// Session lifetime for a login with or without "remember me".
    pub fn session_ttl(&self, remember: bool) -> Duration {
        if remember {
            Duration::seconds(self.remember_session_ttl_secs)
        } else {
            Duration::seconds(self.browser_session_ttl_secs)
        }
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}
