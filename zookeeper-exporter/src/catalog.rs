//! Static catalog of the ZooKeeper statistics exported as metrics.
//!
//! Keys reported by `mntr` (and the three keys synthesized from `wchs`) that
//! appear here become observations; every other key is ignored so newer
//! servers can report fields this exporter does not know about.

use prometheus_client::metrics::MetricType;
use tracing::warn;
use zk_fourletter::response::{WCHS_TOTAL_WATCH, WCHS_WATCH_CONNECTIONS, WCHS_WATCH_PATHS};

/// Label carrying the scraped `ip:port` on every series.
pub const TARGET_LABEL: &str = "target_host";

/// Label carrying the server role on `zk_server_state`.
pub const STATE_LABEL: &str = "state";

/// The exposition type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Untyped,
}

impl MetricKind {
    /// The `prometheus-client` type used in the TYPE line.
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricKind::Counter => MetricType::Counter,
            MetricKind::Gauge => MetricType::Gauge,
            MetricKind::Untyped => MetricType::Unknown,
        }
    }
}

/// How the sample value is derived from the raw reply value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValueExtractor {
    /// Parse as `f64`, falling back to `0.0`.
    Numeric,
    /// Ignore the raw value.
    Constant(f64),
}

impl ValueExtractor {
    pub fn extract(&self, raw: &str) -> f64 {
        match self {
            ValueExtractor::Numeric => parse_float_or_zero(raw),
            ValueExtractor::Constant(v) => *v,
        }
    }
}

/// Which labels a metric carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelShape {
    /// `target_host` only.
    Target,
    /// `state` (the raw reply value) then `target_host`.
    StateAndTarget,
}

impl LabelShape {
    /// Label names, in exposition order.
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            LabelShape::Target => &[TARGET_LABEL],
            LabelShape::StateAndTarget => &[STATE_LABEL, TARGET_LABEL],
        }
    }

    /// Label pairs for one observation; always as long as [`Self::names`].
    pub fn values(&self, raw: &str, target: &str) -> Vec<(&'static str, String)> {
        match self {
            LabelShape::Target => vec![(TARGET_LABEL, target.to_string())],
            LabelShape::StateAndTarget => vec![
                (STATE_LABEL, raw.to_string()),
                (TARGET_LABEL, target.to_string()),
            ],
        }
    }
}

/// A recognized statistic and how to expose it.
#[derive(Debug, PartialEq)]
pub struct MetricDefinition {
    /// Reply key, also used as the metric family name.
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub value: ValueExtractor,
    pub labels: LabelShape,
}

impl MetricDefinition {
    const fn gauge(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: MetricKind::Gauge,
            value: ValueExtractor::Numeric,
            labels: LabelShape::Target,
        }
    }

    const fn counter(name: &'static str, help: &'static str) -> Self {
        Self {
            name,
            help,
            kind: MetricKind::Counter,
            value: ValueExtractor::Numeric,
            labels: LabelShape::Target,
        }
    }
}

/// Availability of the scraped server, 1 when the whole scrape succeeded.
pub static UP: MetricDefinition = MetricDefinition::gauge("zk_up", "Exporter successful");

/// Every statistic the exporter understands.
pub static CATALOG: &[MetricDefinition] = &[
    MetricDefinition::gauge("zk_avg_latency", "Average latency of requests"),
    MetricDefinition::gauge("zk_max_latency", "Maximum seen latency of requests"),
    MetricDefinition::gauge("zk_min_latency", "Minimum seen latency of requests"),
    MetricDefinition::counter("zk_packets_received", "Number of packets received"),
    MetricDefinition::counter("zk_packets_sent", "Number of packets sent"),
    MetricDefinition::gauge("zk_num_alive_connections", "Number of active connections"),
    MetricDefinition::gauge("zk_outstanding_requests", "Number of outstanding requests"),
    MetricDefinition {
        name: "zk_server_state",
        help: "Server state (leader/follower)",
        kind: MetricKind::Untyped,
        value: ValueExtractor::Constant(1.0),
        labels: LabelShape::StateAndTarget,
    },
    MetricDefinition::gauge("zk_znode_count", "Number of znodes"),
    MetricDefinition::gauge("zk_watch_count", "Number of watches"),
    MetricDefinition::gauge("zk_ephemerals_count", "Number of ephemeral nodes"),
    MetricDefinition::gauge("zk_approximate_data_size", "Approximate size of data set"),
    MetricDefinition::gauge(
        "zk_open_file_descriptor_count",
        "Number of open file descriptors",
    ),
    MetricDefinition::counter(
        "zk_max_file_descriptor_count",
        "Maximum number of open file descriptors",
    ),
    MetricDefinition::gauge("zk_followers", "Number of followers"),
    MetricDefinition::gauge("zk_synced_followers", "Number of followers in sync"),
    MetricDefinition::gauge(
        "zk_pending_syncs",
        "Number of followers with synchronizations pending",
    ),
    MetricDefinition::gauge(WCHS_WATCH_CONNECTIONS, "Number of connections with watches"),
    MetricDefinition::gauge(WCHS_TOTAL_WATCH, "Number of watches"),
    MetricDefinition::gauge(WCHS_WATCH_PATHS, "Number of watched paths"),
];

/// Look up the definition for a reply key.
pub fn resolve(key: &str) -> Option<&'static MetricDefinition> {
    CATALOG.iter().find(|def| def.name == key)
}

/// Parse a reply value, logging and substituting `0.0` when it is not a number.
pub fn parse_float_or_zero(raw: &str) -> f64 {
    match raw.parse::<f64>() {
        Ok(v) => v,
        Err(e) => {
            warn!(value = %raw, error = %e, "Failed to parse to float64");
            0.0
        }
    }
}
