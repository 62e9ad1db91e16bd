//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server network settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database settings.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Suggestion gateway settings.
    #[serde(default)]
    pub suggest: SuggestConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Busy timeout for SQLite connections, in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Maximum number of pooled SQLite connections.
    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "podium_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

/// Suggestion gateway configuration.
///
/// When `endpoint` is unset the server uses the built-in deterministic
/// suggester instead of calling out to a remote service.
#[derive(Debug, Clone, Deserialize)]
pub struct SuggestConfig {
    /// URL of the remote suggestion service.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Timeout for remote suggestion calls, in milliseconds.
    #[serde(default = "default_suggest_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "podium.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_suggest_timeout_ms() -> u64 {
    5_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: default_suggest_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `PODIUM_HOST` overrides `server.host`
/// - `PODIUM_PORT` overrides `server.port`
/// - `PODIUM_DB_PATH` overrides `database.path`
/// - `PODIUM_LOG_LEVEL` overrides `logging.level`
/// - `PODIUM_LOG_JSON` overrides `logging.json` (set to "true" to enable)
/// - `PODIUM_SUGGEST_ENDPOINT` overrides `suggest.endpoint`
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    // Environment variable overrides
    if let Ok(host) = std::env::var("PODIUM_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Ok(port) = std::env::var("PODIUM_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Ok(db_path) = std::env::var("PODIUM_DB_PATH") {
        config.database.path = db_path;
    }
    if let Ok(level) = std::env::var("PODIUM_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Ok(json) = std::env::var("PODIUM_LOG_JSON") {
        config.logging.json = json == "true" || json == "1";
    }
    if let Ok(endpoint) = std::env::var("PODIUM_SUGGEST_ENDPOINT") {
        if !endpoint.trim().is_empty() {
            config.suggest.endpoint = Some(endpoint);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_file() {
        let config = load_config(None).expect("defaults should load");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.path, "podium.db");
        assert_eq!(config.logging.level, "info");
        assert!(config.suggest.endpoint.is_none());
        assert_eq!(config.suggest.timeout_ms, 5_000);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config(Some("/nonexistent/podium.toml")).expect("should fall back");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn parses_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[server]\nport = 8080\n\n[suggest]\nendpoint = \"http://localhost:9999/suggest\"\ntimeout_ms = 1500\n",
        )
        .unwrap();

        let config = load_config(path.to_str()).expect("should parse");
        assert_eq!(config.server.port, 8080);
        // Unspecified sections keep their defaults.
        assert_eq!(config.database.path, "podium.db");
        assert_eq!(
            config.suggest.endpoint.as_deref(),
            Some("http://localhost:9999/suggest")
        );
        assert_eq!(config.suggest.timeout_ms, 1500);
    }
}
