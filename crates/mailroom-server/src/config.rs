//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (MAILROOM_*)
//! - TOML configuration file

use anyhow::{Context, Result};
use mailroom_core::RoomConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Durable log storage.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-room tunables.
    #[serde(default)]
    pub rooms: RoomsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local; logs do not survive a restart.
    Memory,
    /// One JSON document per room under `storage.path`.
    File,
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Which backend to use.
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// Root directory for the file backend.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

/// Per-room tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    /// Log length that triggers eviction when exceeded.
    #[serde(default = "default_log_high_water")]
    pub log_high_water: usize,

    /// Entries kept after an eviction.
    #[serde(default = "default_log_retain")]
    pub log_retain: usize,

    /// Maximum entries in a history replay.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,

    /// Room command mailbox capacity.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Deadline for a durable write, in milliseconds.
    #[serde(default = "default_persist_timeout_ms")]
    pub persist_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("MAILROOM_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("MAILROOM_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080)
}

fn default_true() -> bool {
    true
}

fn default_backend() -> StorageBackend {
    StorageBackend::File
}

fn default_storage_path() -> String {
    "./mailroom-data".to_string()
}

fn default_log_high_water() -> usize {
    10_000
}

fn default_log_retain() -> usize {
    100
}

fn default_history_limit() -> usize {
    100
}

fn default_mailbox_capacity() -> usize {
    256
}

fn default_persist_timeout_ms() -> u64 {
    5_000
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            storage: StorageConfig::default(),
            rooms: RoomsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            path: default_storage_path(),
        }
    }
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            log_high_water: default_log_high_water(),
            log_retain: default_log_retain(),
            history_limit: default_history_limit(),
            mailbox_capacity: default_mailbox_capacity(),
            persist_timeout_ms: default_persist_timeout_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "mailroom.toml",
            "/etc/mailroom/mailroom.toml",
            "~/.config/mailroom/mailroom.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Per-room tunables in the form the core takes them.
    #[must_use]
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            log_high_water: self.rooms.log_high_water,
            log_retain: self.rooms.log_retain,
            history_limit: self.rooms.history_limit,
            mailbox_capacity: self.rooms.mailbox_capacity,
            persist_timeout: Duration::from_millis(self.rooms.persist_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert_eq!(config.rooms.log_high_water, 10_000);
        assert_eq!(config.rooms.log_retain, 100);
        assert!(config.metrics.enabled);
    }

    #[test]
    fn test_room_config_conversion() {
        let config = Config::default();
        let rooms = config.room_config();
        assert_eq!(rooms.history_limit, 100);
        assert_eq!(rooms.persist_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [storage]
            backend = "memory"

            [rooms]
            log_high_water = 500
            log_retain = 50
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.rooms.log_high_water, 500);
        assert_eq!(config.rooms.log_retain, 50);
        // Untouched sections keep their defaults
        assert_eq!(config.rooms.history_limit, 100);
    }
}
