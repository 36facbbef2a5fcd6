//! Configuration management for podstats.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides
//! - Validation and defaults

use crate::core::{PodstatsError, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Complete configuration for podstats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,
    /// Watch and list collector configuration
    pub collector: CollectorConfig,
    /// Exposition endpoint configuration
    pub exposition: ExpositionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for the exposition endpoint
    pub bind_address: IpAddr,
    /// HTTP port for the exposition endpoint
    pub port: u16,
}

/// Collector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Namespace to watch and list
    pub namespace: String,
    /// Kubeconfig file; the client config is inferred when unset
    pub kubeconfig: Option<PathBuf>,
    /// Delay before every reconnect of the watch stream
    #[serde(with = "humantime_serde")]
    pub watch_backoff: Duration,
    /// Interval between metric listings
    #[serde(with = "humantime_serde")]
    pub list_interval: Duration,
    /// Capacity of the aggregation table's input channel
    pub channel_capacity: usize,
    /// Run the pod watcher
    pub enable_watch: bool,
    /// Run the metrics poller
    pub enable_list: bool,
}

/// Exposition configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpositionConfig {
    /// Line format of the exposition body
    pub format: ExpositionFormat,
    /// How long a rendered body is served from cache (0 disables caching)
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
    /// Query parameter that forces a cache refresh
    pub refresh_key: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
}

/// Exposition line formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpositionFormat {
    /// `key value`
    Plain,
    /// `key value unix_millis`
    Timestamped,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig::default(),
            collector: CollectorConfig::default(),
            exposition: ExpositionConfig::default(),
            logging: LoggingConfig::default(),
            debug: false,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            port: 8080,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            namespace: "default".to_string(),
            kubeconfig: None,
            watch_backoff: Duration::from_secs(2),
            list_interval: Duration::from_secs(10),
            channel_capacity: 1024,
            enable_watch: true,
            enable_list: true,
        }
    }
}

impl Default for ExpositionConfig {
    fn default() -> Self {
        ExpositionConfig {
            format: ExpositionFormat::Plain,
            cache_ttl: Duration::from_secs(600), // 10 minutes
            refresh_key: "opn".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(PodstatsError::config("port must be greater than 0"));
        }

        if self.collector.namespace.trim().is_empty() {
            return Err(PodstatsError::config("namespace must not be empty"));
        }

        // A zero backoff would spin on a failing API server
        if self.collector.watch_backoff.is_zero() {
            return Err(PodstatsError::config("watch_backoff must be greater than 0"));
        }

        if self.collector.list_interval.is_zero() {
            return Err(PodstatsError::config("list_interval must be greater than 0"));
        }

        if self.collector.channel_capacity == 0 {
            return Err(PodstatsError::config("channel_capacity must be greater than 0"));
        }

        if self.exposition.refresh_key.is_empty() {
            return Err(PodstatsError::config("refresh_key must not be empty"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)?;
        Ok(self)
    }

    /// Set HTTP port
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    /// Set namespace
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.collector.namespace = namespace.into();
        self
    }

    /// Set kubeconfig path
    pub fn kubeconfig(mut self, path: PathBuf) -> Self {
        self.config.collector.kubeconfig = Some(path);
        self
    }

    /// Set watch reconnect backoff
    pub fn watch_backoff(mut self, backoff: Duration) -> Self {
        self.config.collector.watch_backoff = backoff;
        self
    }

    /// Set list interval
    pub fn list_interval(mut self, interval: Duration) -> Self {
        self.config.collector.list_interval = interval;
        self
    }

    /// Set exposition cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.exposition.cache_ttl = ttl;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
