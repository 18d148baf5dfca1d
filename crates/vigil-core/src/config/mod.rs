//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `VIGIL_CONFIG` env var
//! 3. **Environment variables**: `VIGIL__*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`TrackerConfig`]: Poll interval, timeouts and health thresholds
//! - [`BackendConfig`]: Node definitions with priority class and rank
//! - [`StatusConfig`]: Status endpoint bind address
//! - [`LoggingConfig`]: Log level and format
//!
//! # Example
//!
//! ```toml
//! [tracker]
//! poll_interval_ms = 2000
//! min_peer_count = 3
//!
//! [[backends]]
//! name = "normal"
//! rpc_url = "http://10.0.0.1:8545"
//!
//! [[backends]]
//! name = "fallback"
//! rpc_url = "http://10.0.0.2:8545"
//! class = "fallback"
//! ```

use crate::{
    backend::{BackendOptions, HttpClientConfig},
    consensus::TrackerSettings,
    types::PriorityClass,
};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, path::Path, time::Duration};
use thiserror::Error;

/// Configuration loading or validation failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Group-wide tracker settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Time between rounds. Defaults to `2000`.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Default per-probe timeout, overridable per backend. Defaults to `5000`.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Upper bound for one backend's whole poll. Defaults to `10000`.
    #[serde(default = "default_round_timeout_ms")]
    pub round_timeout_ms: u64,

    /// Minimum peers for a backend to count as healthy. Defaults to `1`.
    #[serde(default = "default_min_peer_count")]
    pub min_peer_count: u64,

    /// Exclude backends trailing the highest one of their class by more than this many
    /// blocks. Disabled when unset.
    #[serde(default)]
    pub max_block_lag: Option<u64>,

    /// Keep polling fallback backends in normal mode. Defaults to `true`.
    #[serde(default = "default_warm_fallbacks")]
    pub warm_fallbacks: bool,

    /// Cap on concurrent in-flight probe requests across all backends. Defaults to `256`.
    #[serde(default = "default_max_concurrent_probes")]
    pub max_concurrent_probes: usize,
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_round_timeout_ms() -> u64 {
    10_000
}

fn default_min_peer_count() -> u64 {
    1
}

fn default_warm_fallbacks() -> bool {
    true
}

fn default_max_concurrent_probes() -> usize {
    256
}

/// One upstream node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique name used in logs and the status endpoint.
    pub name: String,

    /// JSON-RPC endpoint. Must start with `http` or `https`.
    pub rpc_url: String,

    /// `primary` (default) or `fallback`.
    #[serde(default)]
    pub class: PriorityClass,

    /// Order within the class; lower comes first. Defaults to `0`.
    #[serde(default)]
    pub rank: u32,

    /// Overrides `tracker.probe_timeout_ms` for this backend.
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,

    /// Ignore the peer count when judging health.
    #[serde(default)]
    pub skip_peer_count: bool,
}

impl BackendConfig {
    /// Effective probe timeout given the tracker defaults.
    #[must_use]
    pub fn probe_timeout(&self, tracker: &TrackerConfig) -> Duration {
        Duration::from_millis(self.probe_timeout_ms.unwrap_or(tracker.probe_timeout_ms))
    }

    #[must_use]
    pub fn options(&self, tracker: &TrackerConfig) -> BackendOptions {
        BackendOptions::new(self.name.as_str(), self.class)
            .rank(self.rank)
            .probe_timeout(self.probe_timeout(tracker))
            .skip_peer_count(self.skip_peer_count)
    }
}

/// Status endpoint settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_bind_port() -> u16 {
    8090
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default directive when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub tracker: TrackerConfig,

    #[serde(default)]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub status: StatusConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_environment() -> String {
    "development".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            round_timeout_ms: default_round_timeout_ms(),
            min_peer_count: default_min_peer_count(),
            max_block_lag: None,
            warm_fallbacks: default_warm_fallbacks(),
            max_concurrent_probes: default_max_concurrent_probes(),
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self { bind_address: default_bind_address(), bind_port: default_bind_port() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: default_log_format() }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            tracker: TrackerConfig::default(),
            backends: Vec::new(),
            status: StatusConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `VIGIL__` prefix can override any configuration value.
    /// Use `__` as a separator for nested fields (e.g., `VIGIL__TRACKER__MIN_PEER_COUNT=3`).
    /// A missing file is not an error; compiled defaults apply.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("environment", "development")?
            .set_default("tracker.poll_interval_ms", 2000)?
            .set_default("tracker.probe_timeout_ms", 5000)?
            .set_default("tracker.round_timeout_ms", 10_000)?
            .set_default("tracker.min_peer_count", 1)?
            .set_default("tracker.warm_fallbacks", true)?
            .set_default("tracker.max_concurrent_probes", 256)?
            .set_default("status.bind_address", "127.0.0.1")?
            .set_default("status.bind_port", 8090)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()?;

        Ok(config_builder.try_deserialize()?)
    }

    /// Loads configuration from `config/config.toml`, or the file named by `VIGIL_CONFIG`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Load`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "config/config.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// Checks include:
    /// - At least one backend, and at least one of them `primary`
    /// - Backend names are unique and URLs are HTTP(S)
    /// - Intervals and timeouts are greater than zero
    /// - The round timeout is not shorter than any probe timeout
    /// - Logging format is either `"json"` or `"pretty"`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.backends.is_empty() {
            return invalid("No backends configured".to_string());
        }

        if self.tracker.poll_interval_ms == 0 {
            return invalid("Poll interval must be greater than 0".to_string());
        }
        if self.tracker.probe_timeout_ms == 0 || self.tracker.round_timeout_ms == 0 {
            return invalid("Probe and round timeouts must be greater than 0".to_string());
        }
        if self.tracker.max_concurrent_probes == 0 {
            return invalid("Max concurrent probes must be greater than 0".to_string());
        }

        let mut names = HashSet::with_capacity(self.backends.len());
        for backend in &self.backends {
            if backend.name.is_empty() {
                return invalid("Backend name must not be empty".to_string());
            }
            if !names.insert(backend.name.as_str()) {
                return invalid(format!("Duplicate backend name: {}", backend.name));
            }
            if !backend.rpc_url.starts_with("http") {
                return invalid(format!(
                    "Invalid RPC URL for backend {}: {}",
                    backend.name, backend.rpc_url
                ));
            }
            if backend.probe_timeout_ms == Some(0) {
                return invalid(format!("Probe timeout for backend {} must be greater than 0", backend.name));
            }
            if backend.probe_timeout(&self.tracker) > self.round_timeout() {
                return invalid(format!(
                    "Round timeout ({}ms) is shorter than the probe timeout of backend {}",
                    self.tracker.round_timeout_ms, backend.name
                ));
            }
        }

        if !self.backends.iter().any(|b| b.class == PriorityClass::Primary) {
            return invalid("At least one primary backend is required".to_string());
        }

        if self.status.bind_port == 0 {
            return invalid("Bind port must be greater than 0".to_string());
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return invalid("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.tracker.poll_interval_ms)
    }

    #[must_use]
    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.tracker.round_timeout_ms)
    }

    #[must_use]
    pub fn tracker_settings(&self) -> TrackerSettings {
        TrackerSettings {
            min_peer_count: self.tracker.min_peer_count,
            max_block_lag: self.tracker.max_block_lag,
            round_timeout: self.round_timeout(),
            warm_fallbacks: self.tracker.warm_fallbacks,
        }
    }

    #[must_use]
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            concurrent_limit: self.tracker.max_concurrent_probes,
            ..HttpClientConfig::default()
        }
    }

    /// Returns the parsed socket address for the status endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the address cannot be parsed.
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, ConfigError> {
        format!("{}:{}", self.status.bind_address, self.status.bind_port).parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "Invalid socket address: {}:{}",
                self.status.bind_address, self.status.bind_port
            ))
        })
    }
}
