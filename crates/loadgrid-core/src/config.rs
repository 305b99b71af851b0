//! Grid configuration: node set, window size, weights, retry, queues.
//!
//! Every knob has a default, so an empty file describes the reference
//! cluster (three nodes of capacity 8). Durations are written as strings
//! such as `"300ms"`, `"1s"` or `"2m"`.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::NodeSpec;

const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_BACKOFF: Duration = Duration::from_millis(300);
const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Longest duration [`parse_duration`] accepts (30 days). Timers built from
/// config durations add them to `Instant::now()`, which must not overflow.
pub const MAX_DURATION: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Full static description of a grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GridConfig {
    /// How capacity is committed when a job is assigned.
    pub admission: AdmissionMode,
    /// What node workers do with queued jobs on shutdown.
    pub shutdown: ShutdownPolicy,
    /// Nodes in iteration order. Order breaks score ties.
    pub nodes: Vec<NodeSpec>,
    pub metrics: MetricsConfig,
    pub scoring: ScoringConfig,
    pub retry: RetryConfig,
    pub queues: QueueConfig,
    pub report: ReportConfig,
}

/// Capacity commitment at decision time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionMode {
    /// Reserve the job's demand on the chosen node when it is assigned and
    /// convert the reservation into usage when the node dequeues the job.
    #[default]
    Reserve,
    /// Check feasibility against current usage only. Admitted jobs that have
    /// not started yet are invisible, so bursts can oversubscribe a node.
    Advisory,
}

/// Fate of jobs still sitting in a node queue when the node stops.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownPolicy {
    /// Discard queued jobs; the job currently executing still completes.
    #[default]
    Drop,
    /// Execute every queued job before the worker exits.
    Drain,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Number of recent samples kept per node.
    pub window_size: usize,
    /// Period of the collector's self-sampling pass.
    pub sample_interval: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_size: 10,
            sample_interval: "1s".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the available-capacity term.
    pub headroom_weight: f64,
    /// Weight of the trended-saturation term.
    pub trend_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            headroom_weight: 0.7,
            trend_weight: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before a job that fit nowhere is re-queued.
    pub backoff: String,
    /// Placement attempts before a job is rejected. Unset means unbounded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Reject immediately when the demand exceeds every node's capacity.
    pub reject_oversized: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            backoff: "300ms".to_string(),
            max_attempts: None,
            reject_oversized: true,
        }
    }
}

/// Bounded channel depths.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    pub arrival: usize,
    pub node: usize,
    pub metrics: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            arrival: 200,
            node: 50,
            metrics: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub interval: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            interval: "5s".to_string(),
        }
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            admission: AdmissionMode::default(),
            shutdown: ShutdownPolicy::default(),
            nodes: vec![NodeSpec::new(1, 8), NodeSpec::new(2, 8), NodeSpec::new(3, 8)],
            metrics: MetricsConfig::default(),
            scoring: ScoringConfig::default(),
            retry: RetryConfig::default(),
            queues: QueueConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl GridConfig {
    /// Load and validate a config file.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: GridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A config with the given nodes and every other setting at its default.
    pub fn with_nodes(nodes: Vec<NodeSpec>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.nodes.is_empty() {
            return Err(ConfigError::NoNodes);
        }
        let mut seen = HashSet::new();
        for node in &self.nodes {
            if !seen.insert(node.id) {
                return Err(ConfigError::DuplicateNode(node.id));
            }
            if node.capacity == 0 {
                return Err(ConfigError::ZeroCapacity(node.id));
            }
        }

        if self.metrics.window_size == 0 {
            return Err(invalid("metrics.window_size", "must be at least 1"));
        }
        for (field, weight) in [
            ("scoring.headroom_weight", self.scoring.headroom_weight),
            ("scoring.trend_weight", self.scoring.trend_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(invalid(field, format!("{weight} is not a non-negative number")));
            }
        }
        if self.retry.max_attempts == Some(0) {
            return Err(invalid("retry.max_attempts", "must be at least 1 when set"));
        }
        for (field, depth) in [
            ("queues.arrival", self.queues.arrival),
            ("queues.node", self.queues.node),
            ("queues.metrics", self.queues.metrics),
        ] {
            if depth == 0 {
                return Err(invalid(field, "queue depth must be at least 1"));
            }
        }
        for (field, value) in [
            ("metrics.sample_interval", &self.metrics.sample_interval),
            ("retry.backoff", &self.retry.backoff),
            ("report.interval", &self.report.interval),
        ] {
            match parse_duration(value) {
                Some(d) if !d.is_zero() || field == "retry.backoff" => {}
                Some(_) => return Err(invalid(field, "interval must be non-zero")),
                None => {
                    return Err(invalid(
                        field,
                        format!("cannot parse duration {value:?} (at most 30 days)"),
                    ));
                }
            }
        }
        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        parse_duration(&self.metrics.sample_interval).unwrap_or(DEFAULT_SAMPLE_INTERVAL)
    }

    pub fn backoff(&self) -> Duration {
        parse_duration(&self.retry.backoff).unwrap_or(DEFAULT_BACKOFF)
    }

    pub fn report_interval(&self) -> Duration {
        parse_duration(&self.report.interval).unwrap_or(DEFAULT_REPORT_INTERVAL)
    }

    /// Largest single-node capacity in the cluster.
    pub fn max_capacity(&self) -> u32 {
        self.nodes.iter().map(|n| n.capacity).max().unwrap_or(0)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Parse a duration string like "300ms", "1s", "2m".
///
/// Returns `None` for malformed input and for anything above
/// [`MAX_DURATION`].
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let duration = if let Some(ms) = s.strip_suffix("ms") {
        Duration::from_millis(ms.trim().parse::<u64>().ok()?)
    } else if let Some(secs) = s.strip_suffix('s') {
        Duration::from_secs(secs.trim().parse::<u64>().ok()?)
    } else if let Some(mins) = s.strip_suffix('m') {
        Duration::from_secs(mins.trim().parse::<u64>().ok()?.checked_mul(60)?)
    } else {
        return None;
    };
    (duration <= MAX_DURATION).then_some(duration)
}
