//! prodrate.toml configuration parser.
//!
//! Every field is optional; a missing file section falls back to the
//! defaults that match the experiment producer (`localhost:3001`,
//! `experiment_producer_event_count_total`, 1 s cadence, 300 points).

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::exposition::AggregationMode;
use crate::rate::CounterResetPolicy;
use crate::window::DEFAULT_MAX_POINTS;

pub const DEFAULT_PRODUCER_CONNECTION: &str = "localhost:3001";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_METRIC_NAME: &str = "experiment_producer_event_count_total";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProdrateConfig {
    /// `host:port` of the producer's metrics server.
    pub producer_connection: String,
    pub metrics_path: String,
    pub metric_name: String,
    pub scrape_interval_seconds: f64,
    pub max_points: usize,
    /// Per-fetch budget, e.g. "5s" or "500ms".
    pub fetch_timeout: String,
    pub mode: AggregationMode,
    pub counter_reset: CounterResetPolicy,
}

impl Default for ProdrateConfig {
    fn default() -> Self {
        Self {
            producer_connection: DEFAULT_PRODUCER_CONNECTION.to_string(),
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            metric_name: DEFAULT_METRIC_NAME.to_string(),
            scrape_interval_seconds: 1.0,
            max_points: DEFAULT_MAX_POINTS,
            fetch_timeout: "5s".to_string(),
            mode: AggregationMode::default(),
            counter_reset: CounterResetPolicy::default(),
        }
    }
}

impl ProdrateConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject values the scheduler cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.producer_connection.trim().is_empty() {
            bail!("producer_connection must not be empty");
        }
        if self.metric_name.trim().is_empty() {
            bail!("metric_name must not be empty");
        }
        if !self.metrics_path.starts_with('/') {
            bail!("metrics_path must start with '/', got '{}'", self.metrics_path);
        }
        if !(self.scrape_interval_seconds.is_finite() && self.scrape_interval_seconds > 0.0) {
            bail!(
                "scrape_interval_seconds must be positive, got {}",
                self.scrape_interval_seconds
            );
        }
        if self.max_points == 0 {
            bail!("max_points must be at least 1");
        }
        if parse_duration(&self.fetch_timeout).is_none() {
            bail!("invalid fetch_timeout '{}'", self.fetch_timeout);
        }
        Ok(())
    }

    pub fn scrape_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.scrape_interval_seconds).unwrap_or(Duration::from_secs(1))
    }

    /// Parsed fetch timeout, falling back to 5 s when unparseable.
    pub fn fetch_timeout(&self) -> Duration {
        parse_duration(&self.fetch_timeout).unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }

    pub fn metrics_uri(&self) -> String {
        format!("http://{}{}", self.producer_connection, self.metrics_path)
    }
}

/// Parse a duration string like "5s", "500ms", "1m", or a bare number of seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
