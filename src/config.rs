//! Server configuration.
//!
//! Settings come from an optional YAML file named by `COURIER_CONFIG`; the
//! `LISTEN` environment variable overrides the listen address either way.
//!
//! ```yaml
//! log_level: debug
//! server:
//!   listen_addr: "0.0.0.0:8080"
//!   read_buffer_size: 1024
//!   tcp_nodelay: true
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::env::VarError;
use std::path::Path;

/// Environment variable naming the YAML config file.
pub const CONFIG_ENV: &str = "COURIER_CONFIG";

/// Environment variable overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Size of the per-connection read window.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// One of `trace`, `debug`, `info`, `warn`, `error`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Capacity of the fixed read window reused for every read on a connection.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,

    /// Best effort; failing to set it is logged and ignored.
    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

fn default_tcp_nodelay() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            read_buffer_size: default_read_buffer_size(),
            tcp_nodelay: default_tcp_nodelay(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Loads the configuration from `COURIER_CONFIG` (if set) and applies the
    /// `LISTEN` override.
    pub fn load() -> Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(VarError::NotPresent) => Self::default(),
            Err(VarError::NotUnicode(raw)) => {
                anyhow::bail!("{CONFIG_ENV} is not valid unicode: {raw:?}")
            }
        };

        match std::env::var(LISTEN_ENV) {
            Ok(addr) => cfg.server.listen_addr = addr,
            Err(VarError::NotPresent) => {}
            Err(VarError::NotUnicode(raw)) => {
                anyhow::bail!("{LISTEN_ENV} is not valid unicode: {raw:?}")
            }
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.server.read_buffer_size == 0 {
            anyhow::bail!("server.read_buffer_size must be at least 1");
        }
        self.max_level()?;
        Ok(())
    }

    /// Parses `log_level` into a tracing level.
    pub fn max_level(&self) -> Result<tracing::Level> {
        self.log_level
            .parse()
            .map_err(|_| anyhow::anyhow!("unknown log level: {}", self.log_level))
    }
}
