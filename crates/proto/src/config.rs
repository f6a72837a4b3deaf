//! Server configuration
//!
//! Values are resolved in three layers, later ones winning:
//!
//! 1. Built-in defaults
//! 2. The TOML file named by `KGP_CONFIG`, if set
//! 3. Environment variables
//!
//! | Variable | Field |
//! |----------|-------|
//! | `KGP_HOST` | `host` |
//! | `KGP_PORT` | `port` |
//! | `KGP_DATABASE` | `database` |
//! | `KGP_LOG_JSON` | `log_json` |
//! | `KGP_MODE_TIMEOUT_MS` | `proto.mode_timeout_ms` |
//! | `KGP_MOVE_TIMEOUT_MS` | `proto.move_timeout_ms` |
//! | `KGP_PING_TIMEOUT_MS` | `proto.ping_timeout_ms` |
//!
//! # Example
//!
//! ```
//! use kgp_proto::ServerConfig;
//!
//! let config: ServerConfig = toml::from_str(
//!     r#"
//!     port = 2761
//!
//!     [proto]
//!     move_timeout_ms = 1500
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.port, 2761);
//! assert_eq!(config.proto.move_timeout_ms, 1500);
//! assert_eq!(config.proto.request_capacity, 8);
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::SchedulerConfig;
use crate::types::{
    DEFAULT_MODE_TIMEOUT_MS, DEFAULT_MOVE_TIMEOUT_MS, DEFAULT_PING_TIMEOUT_MS, DEFAULT_PORT,
    DEFAULT_REQUEST_CAPACITY, DEFAULT_SIZE, DEFAULT_STONES,
};

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// SQLite database file.
    pub database: PathBuf,
    /// Emit JSON log lines.
    pub log_json: bool,
    pub proto: ProtoConfig,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            database: PathBuf::from("kgp.db"),
            log_json: false,
            proto: ProtoConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Per-session protocol settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtoConfig {
    /// Time a client has to request a mode.
    pub mode_timeout_ms: u64,
    /// Time a client has to answer a `state` request.
    pub move_timeout_ms: u64,
    /// Time a client has to answer a `ping`.
    pub ping_timeout_ms: u64,
    /// Check liveness with `ping`. When disabled, every check succeeds.
    pub ping: bool,
    /// Capacity of the inbound request queue.
    pub request_capacity: usize,
}

impl Default for ProtoConfig {
    fn default() -> Self {
        Self {
            mode_timeout_ms: DEFAULT_MODE_TIMEOUT_MS,
            move_timeout_ms: DEFAULT_MOVE_TIMEOUT_MS,
            ping_timeout_ms: DEFAULT_PING_TIMEOUT_MS,
            ping: true,
            request_capacity: DEFAULT_REQUEST_CAPACITY,
        }
    }
}

impl ProtoConfig {
    pub fn mode_timeout(&self) -> Duration {
        Duration::from_millis(self.mode_timeout_ms)
    }

    pub fn move_timeout(&self) -> Duration {
        Duration::from_millis(self.move_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

/// Shape of new boards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub size: usize,
    pub stones: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            size: DEFAULT_SIZE,
            stones: DEFAULT_STONES,
        }
    }
}

impl From<&GameConfig> for SchedulerConfig {
    fn from(game: &GameConfig) -> Self {
        SchedulerConfig {
            size: game.size,
            stones: game.stones,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Defaults overridden by environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Resolve the full configuration: defaults, `KGP_CONFIG` file, environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var("KGP_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Override fields from `lookup`. Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(host) = var("KGP_HOST") {
            self.host = host;
        }
        if let Some(port) = var("KGP_PORT").and_then(|s| s.parse().ok()) {
            self.port = port;
        }
        if let Some(database) = var("KGP_DATABASE") {
            self.database = PathBuf::from(database);
        }
        if let Some(json) = var("KGP_LOG_JSON") {
            self.log_json = json == "1" || json.eq_ignore_ascii_case("true");
        }
        if let Some(ms) = var("KGP_MODE_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.proto.mode_timeout_ms = ms;
        }
        if let Some(ms) = var("KGP_MOVE_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.proto.move_timeout_ms = ms;
        }
        if let Some(ms) = var("KGP_PING_TIMEOUT_MS").and_then(|s| s.parse().ok()) {
            self.proto.ping_timeout_ms = ms;
        }
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proto.request_capacity == 0 {
            return Err(ConfigError::Invalid("proto.request_capacity must be positive".into()));
        }
        if self.game.size == 0 {
            return Err(ConfigError::Invalid("game.size must be positive".into()));
        }
        if self.game.stones == 0 {
            return Err(ConfigError::Invalid("game.stones must be positive".into()));
        }
        Ok(())
    }

    /// `host:port` for binding the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
