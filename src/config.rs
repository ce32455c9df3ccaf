//! Configuration module
//!
//! Reads a TOML file (default `~/.config/trellis-connector/config.toml`,
//! overridable via `CONNECTOR_CONFIG`). Every section has defaults so a
//! missing file yields a runnable dev configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSection,
    pub management: ManagementConfig,
    pub token: TokenConfig,
    pub data_plane: DataPlaneConfig,
    pub state_machine: StateMachineConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the HTTP server
    pub host: String,
    pub port: u16,
    /// Seconds granted to in-flight work after a shutdown signal
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8181,
            shutdown_timeout: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SeaORM connection URL
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: "sqlite://./connector.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ManagementConfig {
    /// Static api-key expected in `X-Api-Key` on management routes
    pub api_key: String,
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            api_key: "trl_dev_management_key".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HS256 secret for data-plane access tokens
    pub secret: String,
    /// Token lifetime in seconds
    pub ttl_seconds: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            ttl_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DataPlaneConfig {
    /// Upper bound on concurrently running data flows
    pub max_flows: usize,
    /// Bearer token presented to counterparty control planes, if any
    pub dispatch_token: Option<String>,
}

impl Default for DataPlaneConfig {
    fn default() -> Self {
        Self {
            max_flows: 32,
            dispatch_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StateMachineConfig {
    /// Milliseconds between state machine ticks
    pub tick_interval_ms: u64,
    /// Processes fetched per pending state per tick
    pub batch_size: u64,
    /// Attempts for counterparty dispatch before terminating the process
    pub dispatch_max_attempts: u32,
}

impl Default for StateMachineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 500,
            batch_size: 16,
            dispatch_max_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Tracing filter, e.g. `info` or `trellis_connector=debug,info`
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Default config file location
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trellis-connector")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.state_machine.batch_size, 16);
        assert_eq!(config.data_plane.max_flows, 32);
        assert!(config.database.url.starts_with("sqlite://"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [server]
            port = 9191

            [management]
            api_key = "trl_secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.management.api_key, "trl_secret");
        assert_eq!(config.token.ttl_seconds, 600);
    }

    #[test]
    fn address_joins_host_and_port() {
        let config = AppConfig::default();
        assert_eq!(config.address(), "0.0.0.0:8181");
    }
}
