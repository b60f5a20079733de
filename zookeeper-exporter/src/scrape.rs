//! Per-request scrape pipeline.
//!
//! A scrape owns everything it produces: the [`ScrapeResult`] is built fresh
//! for one request, registered into a fresh [`Registry`], encoded and dropped.
//! Concurrent scrapes share nothing but the static catalog.

use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::counter::ConstCounter;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use zk_fourletter::{CommandError, FourLetterClient, FourLetterWord};

use crate::catalog::{self, MetricDefinition, MetricKind};
use crate::config::ZookeeperConfig;
use crate::telemetry::{ExporterMetrics, ScrapeOutcome};

/// Why a scrape request was rejected before any network I/O.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("'target' parameter must be specified")]
    Missing,
    #[error("Invalid 'target' parameter, parse err: {0}")]
    Invalid(String),
}

/// The ZooKeeper server a scrape is aimed at.
///
/// Samples are labeled with the parameter as the caller wrote it, so
/// relabeling rules that join on the scrape parameter keep matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target {
    addr: SocketAddr,
    label: String,
}

impl Target {
    /// Parse the `target` query parameter.
    ///
    /// The host must be an IP address and the port is required; IPv6 hosts
    /// are written in brackets (`[::1]:2181`).
    pub fn parse(raw: Option<&str>) -> Result<Self, TargetError> {
        let raw = match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(TargetError::Missing),
        };

        raw.parse::<SocketAddr>()
            .map(|addr| Self {
                addr,
                label: raw.to_string(),
            })
            .map_err(|_| TargetError::Invalid(raw.to_string()))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Value of the `target_host` label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl From<SocketAddr> for Target {
    fn from(addr: SocketAddr) -> Self {
        Self {
            addr,
            label: addr.to_string(),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

/// One sample: a catalog entry, its value and its label pairs.
#[derive(Debug, Clone)]
pub struct Observation {
    pub definition: &'static MetricDefinition,
    pub value: f64,
    pub labels: Vec<(&'static str, String)>,
}

/// Everything one scrape gathered for one target.
#[derive(Debug, Clone)]
pub struct ScrapeResult {
    target: Target,
    available: bool,
    observations: Vec<Observation>,
}

impl ScrapeResult {
    fn new(target: Target) -> Self {
        Self {
            target,
            available: false,
            observations: Vec::new(),
        }
    }

    /// Record the raw value of a catalog key.
    ///
    /// A key already observed in this scrape is ignored.
    fn observe(&mut self, definition: &'static MetricDefinition, raw: &str) {
        if self
            .observations
            .iter()
            .any(|o| o.definition.name == definition.name)
        {
            debug!(key = definition.name, "Duplicate key in reply, keeping first value");
            return;
        }

        debug!(key = definition.name, value = %raw, "Sending metric");
        let labels = definition.labels.values(raw, self.target.label());
        self.observations.push(Observation {
            definition,
            value: definition.value.extract(raw),
            labels,
        });
    }

    /// Append the single `zk_up` observation and freeze availability.
    fn finish(&mut self, available: bool) {
        self.available = available;
        let labels = catalog::UP.labels.values("", self.target.label());
        self.observations.push(Observation {
            definition: &catalog::UP,
            value: if available { 1.0 } else { 0.0 },
            labels,
        });
    }

    /// Whether both fetches succeeded and every line parsed.
    pub fn available(&self) -> bool {
        self.available
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    /// Value observed for metric `name`, if any.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.observations
            .iter()
            .find(|o| o.definition.name == name)
            .map(|o| o.value)
    }

    /// Move the observations into a registry of their own.
    pub fn into_registry(self) -> Registry {
        let mut registry = Registry::default();
        registry.register_collector(Box::new(ScrapeCollector {
            observations: self.observations,
        }));
        registry
    }

    /// Encode the observations in the OpenMetrics text format.
    pub fn encode(self) -> Result<String, fmt::Error> {
        let registry = self.into_registry();
        let mut body = String::new();
        prometheus_client::encoding::text::encode(&mut body, &registry)?;
        Ok(body)
    }
}

/// Exposes one scrape's observations to a [`Registry`].
#[derive(Debug)]
struct ScrapeCollector {
    observations: Vec<Observation>,
}

impl Collector for ScrapeCollector {
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        for observation in &self.observations {
            let definition = observation.definition;
            let mut metric_encoder = encoder.encode_descriptor(
                definition.name,
                definition.help,
                None,
                definition.kind.metric_type(),
            )?;
            let sample_encoder = metric_encoder.encode_family(&observation.labels)?;

            match definition.kind {
                MetricKind::Counter => ConstCounter::new(observation.value).encode(sample_encoder)?,
                MetricKind::Gauge | MetricKind::Untyped => {
                    ConstGauge::new(observation.value).encode(sample_encoder)?
                }
            }
        }
        Ok(())
    }
}

/// Drives one scrape: `mntr`, `wchs`, parse, emit, then a detached `srst`.
#[derive(Debug, Clone)]
pub struct Scraper {
    client: FourLetterClient,
    reset_statistics: bool,
    metrics: ExporterMetrics,
}

impl Scraper {
    pub fn new(config: &ZookeeperConfig, metrics: ExporterMetrics) -> Self {
        Self {
            client: FourLetterClient::new(config.timeout()),
            reset_statistics: config.reset_statistics,
            metrics,
        }
    }

    pub fn metrics(&self) -> &ExporterMetrics {
        &self.metrics
    }

    /// Scrape `target` once.
    ///
    /// Never fails: an unreachable server or a malformed reply shows up as
    /// `zk_up` = 0 in the returned result.
    pub async fn scrape(&self, target: Target) -> ScrapeResult {
        let started = Instant::now();
        info!(%target, "Fetching metrics from ZooKeeper");

        let mut result = ScrapeResult::new(target.clone());

        let mntr = match self.fetch(&target, FourLetterWord::Mntr).await {
            Ok(reply) => reply,
            Err(_) => {
                error!(%target, "Failed to fetch metrics");
                result.finish(false);
                self.record(&result, started);
                return result;
            }
        };
        let wchs = self.fetch(&target, FourLetterWord::Wchs).await.ok();

        let response = zk_fourletter::parse(&mntr, wchs.as_deref());
        self.metrics.record_malformed_lines(response.malformed);

        for line in &response.lines {
            if let Some(definition) = catalog::resolve(&line.key) {
                result.observe(definition, &line.value);
            }
        }
        result.finish(!response.degraded);
        self.record(&result, started);

        if self.reset_statistics {
            self.spawn_reset(target);
        }

        result
    }

    async fn fetch(&self, target: &Target, command: FourLetterWord) -> Result<String, CommandError> {
        let reply = self.client.send(target.addr(), command).await;
        self.metrics.record_command(command, reply.is_ok());
        reply
    }

    fn record(&self, result: &ScrapeResult, started: Instant) {
        self.metrics.observe_scrape_duration(started.elapsed());
        self.metrics.record_scrape(if result.available() {
            ScrapeOutcome::Up
        } else {
            ScrapeOutcome::Degraded
        });
    }

    /// Fire `srst` at the target without waiting for it.
    fn spawn_reset(&self, target: Target) {
        let scraper = self.clone();
        tokio::spawn(async move {
            info!(%target, "Resetting ZooKeeper statistics");
            if scraper.fetch(&target, FourLetterWord::Srst).await.is_err() {
                warn!(%target, "Failed to reset statistics");
            }
        });
    }
}
