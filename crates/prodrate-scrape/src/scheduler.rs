//! Scrape scheduler — the fetch → parse → push → notify loop.
//!
//! One scheduler owns one [`Session`]. Cycles never overlap, so samples
//! enter the window in timestamp order without any locking.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use prodrate_core::{
    exposition, AggregationMode, ProdrateConfig, RateEstimator, Sample, SampleWindow,
};

use crate::clock::{next_tick_delay, Clock};
use crate::error::ScrapeError;
use crate::fetch::MetricsSource;
use crate::present::{PresentationPort, RateSeries};

/// State carried across cycles for one running session.
///
/// Created with the scheduler and dropped with it; nothing is persisted.
#[derive(Debug)]
pub struct Session {
    window: SampleWindow,
    /// Monotonic origin for sample timestamps.
    started_at: Duration,
    cycles: u64,
    skipped: u64,
}

impl Session {
    pub fn new(max_points: usize, started_at: Duration) -> Self {
        Self {
            window: SampleWindow::new(max_points),
            started_at,
            cycles: 0,
            skipped: 0,
        }
    }

    pub fn window(&self) -> &SampleWindow {
        &self.window
    }

    pub fn started_at(&self) -> Duration {
        self.started_at
    }

    /// Seconds between the session start and the monotonic reading `now`.
    pub fn offset_secs(&self, now: Duration) -> f64 {
        now.saturating_sub(self.started_at).as_secs_f64()
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// What a single cycle did.
#[derive(Debug)]
pub enum CycleOutcome {
    /// A sample was pushed into the window.
    Sampled(Sample),
    /// The payload parsed but the metric was absent.
    NotFound,
    /// Fetch or parse failed; the cycle was skipped.
    Failed(ScrapeError),
}

/// Drives scrape cycles at a fixed, wall-clock aligned cadence.
pub struct ScrapeScheduler {
    source: Box<dyn MetricsSource>,
    clock: Arc<dyn Clock>,
    presenter: Box<dyn PresentationPort>,
    estimator: RateEstimator,
    metric_name: String,
    mode: AggregationMode,
    interval: Duration,
    session: Session,
}

impl ScrapeScheduler {
    /// Create a scheduler; the session starts at the clock's current time.
    pub fn new(
        config: &ProdrateConfig,
        source: Box<dyn MetricsSource>,
        clock: Arc<dyn Clock>,
        presenter: Box<dyn PresentationPort>,
    ) -> Self {
        let session = Session::new(config.max_points, clock.monotonic());
        Self {
            source,
            clock,
            presenter,
            estimator: RateEstimator::new(config.counter_reset),
            metric_name: config.metric_name.clone(),
            mode: config.mode,
            interval: config.scrape_interval(),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Recompute the rate series from the current window.
    pub fn series(&self) -> RateSeries {
        let samples = self.session.window.snapshot();
        RateSeries {
            metric_name: self.metric_name.clone(),
            points: self.estimator.compute(&samples),
            latest_value: samples.last().map(|s| s.value),
            latest_rate: self.estimator.latest(&samples),
            cycles: self.session.cycles,
            skipped: self.session.skipped,
        }
    }

    /// Run one fetch → parse → push → notify iteration.
    ///
    /// The presenter is notified whether or not a sample was taken.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.session.cycles += 1;
        let cycle = self.session.cycles;

        let scraped = scrape(self.source.as_ref(), &self.metric_name, self.mode).await;
        let outcome = match scraped {
            Ok(Some(value)) => {
                let sample = Sample::new(self.session.offset_secs(self.clock.monotonic()), value);
                self.session.window.push(sample);
                debug!(
                    cycle,
                    timestamp = sample.timestamp,
                    value,
                    window = self.session.window.len(),
                    "sample recorded"
                );
                CycleOutcome::Sampled(sample)
            }
            Ok(None) => {
                self.session.skipped += 1;
                debug!(cycle, metric = %self.metric_name, "metric not exposed yet");
                CycleOutcome::NotFound
            }
            Err(e) => {
                self.session.skipped += 1;
                warn!(cycle, error = %e, "scrape failed, skipping cycle");
                CycleOutcome::Failed(e)
            }
        };

        let series = self.series();
        self.presenter.present(&series);
        outcome
    }

    /// Run cycles until `shutdown` flips to true or its sender is dropped.
    ///
    /// The first cycle runs immediately; later ones wake on interval
    /// boundaries of the wall clock. An in-flight fetch is abandoned when
    /// shutdown arrives.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            source = %self.source.describe(),
            metric = %self.metric_name,
            interval_ms = self.interval.as_millis() as u64,
            max_points = self.session.window.capacity(),
            "scrape scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = self.run_cycle() => {}
                _ = shutdown.changed() => break,
            }

            let delay = next_tick_delay(self.clock.now(), self.interval);
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        info!(
            cycles = self.session.cycles,
            skipped = self.session.skipped,
            "scrape scheduler stopped"
        );
    }
}

async fn scrape(
    source: &dyn MetricsSource,
    metric_name: &str,
    mode: AggregationMode,
) -> Result<Option<f64>, ScrapeError> {
    let payload = source.fetch().await?;
    Ok(exposition::extract(&payload, metric_name, mode)?)
}
