//! Prometheus exporter for Apache ZooKeeper.
//!
//! Each request to `/scrape?target=ip:port` opens fresh connections to the
//! given ZooKeeper server, sends the `mntr` and `wchs` four-letter words, and
//! answers with the statistics in the OpenMetrics text format.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐     ┌─────────────────┐
//! │   HTTP Server   │────>│     Scraper     │────>│    ZooKeeper    │
//! │    (/scrape)    │<────│ (per request)   │<────│  (mntr, wchs)   │
//! └─────────────────┘     └─────────────────┘     └─────────────────┘
//! ```
//!
//! Every scrape builds its own registry, so concurrent scrapes of different
//! targets never see each other's samples.
//!
//! # Usage
//!
//! ```bash
//! zookeeper-exporter --bind-addr 0.0.0.0:8080
//! curl 'http://localhost:8080/scrape?target=127.0.0.1:2181'
//! ```
//!
//! # Configuration
//!
//! See [`config::ExporterConfig`] for configuration options.

pub mod catalog;
pub mod config;
pub mod http;
pub mod scrape;
pub mod telemetry;

pub use config::{ConfigError, ExporterConfig, LogFormat, LoggingConfig};
pub use http::HttpServer;
pub use scrape::{ScrapeResult, Scraper, Target, TargetError};
pub use telemetry::{ExporterMetrics, ScrapeOutcome};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    }
    .map_err(|e| ConfigError::Validation(format!("Failed to initialize tracing: {}", e)))
}
