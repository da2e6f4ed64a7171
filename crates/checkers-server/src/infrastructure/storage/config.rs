//! TOML-based configuration for the checkers server.
//!
//! The file is optional.  When it is absent every field takes its default,
//! and when it is present any missing field does too.  Example:
//!
//! ```toml
//! log_level = "info"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 5000
//!
//! [session]
//! countdown_secs = 5
//! tick_millis = 1000
//! ```
//!
//! Command-line flags are applied on top of the loaded file in `main.rs`.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use checkers_core::DEFAULT_PORT;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::SessionTiming;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "checkers-server.toml";

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` and `port` do not form a socket address.
    #[error("invalid bind address: '{0}'")]
    InvalidAddress(String),

    /// The tick interval must be positive.
    #[error("session.tick_millis must be greater than zero")]
    ZeroTick,
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// `tracing` level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkConfig {
    /// IP address to bind.  `"0.0.0.0"` binds all interfaces.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// TCP port clients connect to.
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Session timing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    /// Seconds between pairing and `GAME_STARTED`.
    #[serde(default = "default_countdown_secs")]
    pub countdown_secs: u64,
    /// Milliseconds between `TIME_UPDATE` broadcasts.
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_countdown_secs() -> u64 {
    5
}
fn default_tick_millis() -> u64 {
    1_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown_secs: default_countdown_secs(),
            tick_millis: default_tick_millis(),
        }
    }
}

// ── Conversions ───────────────────────────────────────────────────────────────

impl NetworkConfig {
    /// The socket address to listen on.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidAddress`] if `bind_address` is not an IP
    /// address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let text = format!("{}:{}", self.bind_address, self.port);
        text.parse().map_err(|_| ConfigError::InvalidAddress(text))
    }
}

impl SessionConfig {
    /// Session timing for the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroTick`] if `tick_millis` is zero.
    pub fn timing(&self) -> Result<SessionTiming, ConfigError> {
        if self.tick_millis == 0 {
            return Err(ConfigError::ZeroTick);
        }
        Ok(SessionTiming {
            countdown: Duration::from_secs(self.countdown_secs),
            tick: Duration::from_millis(self.tick_millis),
        })
    }
}

// ── Load / save ───────────────────────────────────────────────────────────────

/// Loads `ServerConfig` from `path`, or from [`DEFAULT_CONFIG_FILE`] when
/// `path` is `None`.  A missing file yields `ServerConfig::default()`.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: Option<&Path>) -> Result<ServerConfig, ConfigError> {
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

    match std::fs::read_to_string(&path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(e) => Err(ConfigError::Io { path, source: e }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &ServerConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_default_config_listens_on_port_5000() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.network.port, 5000);
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
        assert_eq!(cfg.log_level, "info");
    }

    #[test]
    fn test_default_timing_is_five_second_countdown_and_one_second_tick() {
        let timing = SessionConfig::default().timing().unwrap();
        assert_eq!(timing, SessionTiming::default());
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_deserialize_partial_session_overrides_defaults() {
        // Arrange
        let toml_str = "[session]\ncountdown_secs = 2\n";

        // Act
        let cfg: ServerConfig = toml::from_str(toml_str).unwrap();

        // Assert
        assert_eq!(cfg.session.countdown_secs, 2);
        assert_eq!(cfg.session.tick_millis, 1_000);
        assert_eq!(cfg.network, NetworkConfig::default());
    }

    #[test]
    fn test_deserialize_invalid_toml_returns_parse_error() {
        let result: Result<ServerConfig, _> = toml::from_str("[network\nport = ");
        assert!(result.is_err());
    }

    #[test]
    fn test_bind_addr_combines_address_and_port() {
        let net = NetworkConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 6000,
        };
        assert_eq!(net.bind_addr().unwrap().to_string(), "127.0.0.1:6000");
    }

    #[test]
    fn test_bind_addr_rejects_hostname() {
        let net = NetworkConfig {
            bind_address: "not.an.ip".to_string(),
            port: 5000,
        };
        assert!(matches!(net.bind_addr(), Err(ConfigError::InvalidAddress(_))));
    }

    #[test]
    fn test_zero_tick_is_rejected() {
        let session = SessionConfig {
            countdown_secs: 5,
            tick_millis: 0,
        };
        assert!(matches!(session.timing(), Err(ConfigError::ZeroTick)));
    }

    #[test]
    fn test_load_config_returns_default_when_file_absent() {
        let path = std::env::temp_dir()
            .join(format!("checkers_missing_{}", Uuid::new_v4()))
            .join("config.toml");
        assert_eq!(load_config(Some(&path)).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_save_and_load_config_round_trip_via_temp_dir() {
        // Arrange
        let dir = std::env::temp_dir().join(format!("checkers_test_{}", Uuid::new_v4()));
        let path = dir.join("server.toml");
        let mut cfg = ServerConfig::default();
        cfg.network.port = 12345;
        cfg.session.countdown_secs = 1;
        cfg.log_level = "debug".to_string();

        // Act
        save_config(&path, &cfg).unwrap();
        let loaded = load_config(Some(&path)).unwrap();

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }
}
