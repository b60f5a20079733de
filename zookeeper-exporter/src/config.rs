//! Configuration for the ZooKeeper exporter.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Paths served by the exporter regardless of configuration.
const RESERVED_PATHS: &[&str] = &["/", "/health"];

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// HTTP endpoint settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// ZooKeeper exchange settings.
    #[serde(default)]
    pub zookeeper: ZookeeperConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Path for the per-target scrape endpoint (default: "/scrape").
    #[serde(default = "default_scrape_path")]
    pub scrape_path: String,

    /// Path for the exporter's own metrics (default: "/metrics").
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_scrape_path() -> String {
    "/scrape".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl HttpConfig {
    /// Resolve `listen` to a socket address.
    ///
    /// A bare `:port` listens on all IPv4 interfaces.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let listen = match self.listen.strip_prefix(':') {
            Some(port) => format!("0.0.0.0:{}", port),
            None => self.listen.clone(),
        };

        listen.parse().map_err(|_| {
            ConfigError::Validation(format!("Invalid listen address: {}", self.listen))
        })
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            scrape_path: default_scrape_path(),
            metrics_path: default_metrics_path(),
        }
    }
}

/// Settings for the four-letter-word exchanges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZookeeperConfig {
    /// Deadline for one whole exchange, connect to close (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Send `srst` after every scrape.
    #[serde(default = "default_reset_statistics")]
    pub reset_statistics: bool,
}

fn default_timeout() -> u64 {
    5
}

fn default_reset_statistics() -> bool {
    true
}

impl ZookeeperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ZookeeperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            reset_statistics: default_reset_statistics(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    #[serde(alias = "txt")]
    Text,
    /// Structured JSON format.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!(
                "Invalid log format '{}', valid options are txt and json",
                other
            )),
        }
    }
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: ExporterConfig = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zookeeper.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        self.http.listen_addr()?;

        for path in [&self.http.scrape_path, &self.http.metrics_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "Path must start with /: {}",
                    path
                )));
            }
            if RESERVED_PATHS.contains(&path.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "Path {} is reserved",
                    path
                )));
            }
        }

        if self.http.scrape_path == self.http.metrics_path {
            return Err(ConfigError::Validation(
                "scrape_path and metrics_path must differ".to_string(),
            ));
        }

        Ok(())
    }
}
