//! prodrate-core — the pure half of the scrape-and-derive loop.
//!
//! Parses Prometheus text exposition, keeps a bounded window of counter
//! samples, and derives a production-rate series from it.
//!
//! # Architecture
//!
//! ```text
//! payload ──► exposition::extract() ──► Option<f64>
//!                                         │
//!                                         ▼
//!                         SampleWindow::push(Sample)
//!                                         │
//!                              snapshot() ▼
//!                         RateEstimator::compute() ──► Vec<RatePoint>
//! ```
//!
//! Nothing in this crate performs network I/O; the scheduler that drives
//! it lives in `prodrate-scrape`.

pub mod config;
pub mod error;
pub mod exposition;
pub mod rate;
pub mod window;

pub use config::ProdrateConfig;
pub use error::{ParseError, ParseResult};
pub use exposition::{extract, parse, AggregationMode, MetricFamily, MetricKind, MetricSample};
pub use rate::{CounterResetPolicy, RateEstimator, RatePoint};
pub use window::{Sample, SampleWindow};
