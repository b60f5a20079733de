//! Operational metrics about the exporter itself.
//!
//! These live in a process-wide registry served on the metrics path, apart
//! from the per-scrape registries that carry ZooKeeper statistics.

use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use zk_fourletter::FourLetterWord;

/// How a scrape request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrapeOutcome {
    /// Every fetch succeeded and every line parsed (`zk_up` = 1).
    Up,
    /// Metrics were served with `zk_up` = 0.
    Degraded,
    /// The target parameter was missing or invalid.
    Rejected,
    /// An internal fault turned the request into a 500.
    Failed,
}

impl ScrapeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrapeOutcome::Up => "up",
            ScrapeOutcome::Degraded => "degraded",
            ScrapeOutcome::Rejected => "rejected",
            ScrapeOutcome::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ScrapeLabels {
    outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct CommandLabels {
    command: String,
    result: String,
}

/// Counters and histograms describing the exporter's own work.
///
/// Cloning is cheap; clones share the same underlying values.
#[derive(Clone, Debug)]
pub struct ExporterMetrics {
    scrapes: Family<ScrapeLabels, Counter>,
    commands: Family<CommandLabels, Counter>,
    malformed_lines: Counter,
    scrape_duration: Histogram,
}

impl ExporterMetrics {
    pub fn new() -> Self {
        Self {
            scrapes: Family::default(),
            commands: Family::default(),
            malformed_lines: Counter::default(),
            scrape_duration: Histogram::new(exponential_buckets(0.005, 2.0, 12)),
        }
    }

    /// Register all metrics under the `zookeeper_exporter` prefix.
    pub fn register(&self, registry: &mut Registry) {
        let registry = registry.sub_registry_with_prefix("zookeeper_exporter");

        registry.register(
            "scrapes",
            "Scrape requests handled, by outcome",
            self.scrapes.clone(),
        );
        registry.register(
            "commands",
            "Four-letter words sent to ZooKeeper, by command and result",
            self.commands.clone(),
        );
        registry.register(
            "malformed_lines",
            "mntr reply lines that were not tab-separated key/value pairs",
            self.malformed_lines.clone(),
        );
        registry.register(
            "scrape_duration_seconds",
            "Time spent fetching and parsing ZooKeeper statistics",
            self.scrape_duration.clone(),
        );
    }

    /// Build a fresh registry holding only these metrics.
    pub fn registry(&self) -> Registry {
        let mut registry = Registry::default();
        self.register(&mut registry);
        registry
    }

    pub fn record_scrape(&self, outcome: ScrapeOutcome) {
        self.scrapes
            .get_or_create(&ScrapeLabels {
                outcome: outcome.as_str().to_string(),
            })
            .inc();
    }

    pub fn observe_scrape_duration(&self, elapsed: Duration) {
        self.scrape_duration.observe(elapsed.as_secs_f64());
    }

    pub fn record_command(&self, command: FourLetterWord, ok: bool) {
        self.commands
            .get_or_create(&CommandLabels {
                command: command.as_str().to_string(),
                result: if ok { "ok" } else { "error" }.to_string(),
            })
            .inc();
    }

    pub fn record_malformed_lines(&self, count: usize) {
        self.malformed_lines.inc_by(count as u64);
    }

    /// Number of scrapes recorded with `outcome`.
    pub fn scrapes(&self, outcome: ScrapeOutcome) -> u64 {
        self.scrapes
            .get_or_create(&ScrapeLabels {
                outcome: outcome.as_str().to_string(),
            })
            .get()
    }

    /// Number of `command` exchanges recorded with the given result.
    pub fn commands(&self, command: FourLetterWord, ok: bool) -> u64 {
        self.commands
            .get_or_create(&CommandLabels {
                command: command.as_str().to_string(),
                result: if ok { "ok" } else { "error" }.to_string(),
            })
            .get()
    }

    pub fn malformed_lines(&self) -> u64 {
        self.malformed_lines.get()
    }
}

impl Default for ExporterMetrics {
    fn default() -> Self {
        Self::new()
    }
}
