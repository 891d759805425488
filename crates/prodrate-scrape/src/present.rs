//! Hand-off of the derived series to whatever displays it.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use prodrate_core::RatePoint;

/// The view handed to presenters after every cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateSeries {
    pub metric_name: String,
    /// One point per sample in the window, oldest first.
    pub points: Vec<RatePoint>,
    /// Last cumulative counter value seen, if any.
    pub latest_value: Option<f64>,
    /// Most recent defined rate in the window.
    pub latest_rate: Option<f64>,
    /// Cycles run so far, including skipped ones.
    pub cycles: u64,
    /// Cycles that produced no sample.
    pub skipped: u64,
}

/// Consumer of the rate series.
///
/// Called from the scheduler task once per cycle; implementations must not
/// block for long or they delay the next scrape.
pub trait PresentationPort: Send {
    fn present(&mut self, series: &RateSeries);
}

impl<F> PresentationPort for F
where
    F: FnMut(&RateSeries) + Send,
{
    fn present(&mut self, series: &RateSeries) {
        self(series)
    }
}

/// Publishes each series on a `watch` channel for presenters running on
/// another task. Readers always see the latest series; intermediate ones
/// may be skipped.
#[derive(Debug)]
pub struct WatchPresenter {
    tx: watch::Sender<Arc<RateSeries>>,
}

impl WatchPresenter {
    pub fn channel() -> (Self, watch::Receiver<Arc<RateSeries>>) {
        let (tx, rx) = watch::channel(Arc::new(RateSeries::default()));
        (Self { tx }, rx)
    }
}

impl PresentationPort for WatchPresenter {
    fn present(&mut self, series: &RateSeries) {
        // No receivers is fine; the series is simply dropped.
        self.tx.send_replace(Arc::new(series.clone()));
    }
}
