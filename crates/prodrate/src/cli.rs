//! Command-line surface. Flags override values from `--config`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use prodrate_core::{AggregationMode, CounterResetPolicy, ProdrateConfig};

#[derive(Debug, Parser)]
#[command(
    name = "prodrate",
    about = "Live production rate (events/s) of a Prometheus counter",
    version
)]
pub struct Cli {
    /// Path to a prodrate.toml. Flags below take precedence over it.
    #[arg(short, long, env = "PRODRATE_CONFIG")]
    pub config: Option<PathBuf>,

    /// host:port of the producer's metrics server (default: localhost:3001).
    #[arg(long, env = "PRODRATE_PRODUCER_CONNECTION")]
    pub producer_connection: Option<String>,

    /// Path of the metrics page (default: /metrics).
    #[arg(long)]
    pub metrics_path: Option<String>,

    /// Counter to follow (default: experiment_producer_event_count_total).
    #[arg(long, env = "PRODRATE_METRIC_NAME")]
    pub metric_name: Option<String>,

    /// Seconds between scrapes (default: 1).
    #[arg(long)]
    pub scrape_interval: Option<f64>,

    /// Samples kept in the sliding window (default: 300).
    #[arg(long)]
    pub max_points: Option<usize>,

    /// Per-fetch timeout, e.g. "5s" or "500ms" (default: 5s).
    #[arg(long)]
    pub fetch_timeout: Option<String>,

    /// How to combine label sets: first or sum (default: first).
    #[arg(long)]
    pub mode: Option<AggregationMode>,

    /// Counter reset handling: pass-through, clamp, or gap (default: pass-through).
    #[arg(long)]
    pub counter_reset: Option<CounterResetPolicy>,

    /// What to print on stdout each cycle.
    #[arg(long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Log line format on stderr.
    #[arg(long, value_enum, default_value = "text")]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One status line with a sparkline per cycle.
    Text,
    /// One JSON document per cycle.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

impl Cli {
    /// Load the config file (if any), apply flag overrides, and validate.
    pub fn resolve_config(&self) -> anyhow::Result<ProdrateConfig> {
        let mut config = match &self.config {
            Some(path) => ProdrateConfig::from_file(path)?,
            None => ProdrateConfig::default(),
        };

        if let Some(v) = &self.producer_connection {
            config.producer_connection = v.clone();
        }
        if let Some(v) = &self.metrics_path {
            config.metrics_path = v.clone();
        }
        if let Some(v) = &self.metric_name {
            config.metric_name = v.clone();
        }
        if let Some(v) = self.scrape_interval {
            config.scrape_interval_seconds = v;
        }
        if let Some(v) = self.max_points {
            config.max_points = v;
        }
        if let Some(v) = &self.fetch_timeout {
            config.fetch_timeout = v.clone();
        }
        if let Some(v) = self.mode {
            config.mode = v;
        }
        if let Some(v) = self.counter_reset {
            config.counter_reset = v;
        }

        config.validate()?;
        Ok(config)
    }
}
