//! Terminal presenters for the rate series.
//!
//! Undefined rate points are drawn as blanks (text) or `null` (JSON),
//! never as zero.

use std::io::Write;

use tracing::warn;

use prodrate_core::RatePoint;
use prodrate_scrape::{PresentationPort, RateSeries};

const SPARK_BLOCKS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Number of trailing points shown in the sparkline.
const SPARK_WIDTH: usize = 60;

/// Render rate points as a unicode sparkline scaled to the visible maximum.
pub fn sparkline(points: &[RatePoint]) -> String {
    let max = points
        .iter()
        .filter_map(|p| p.rate)
        .filter(|r| r.is_finite())
        .fold(0.0_f64, f64::max);

    points
        .iter()
        .map(|p| match p.rate {
            Some(rate) if rate.is_finite() => {
                if max <= 0.0 || rate <= 0.0 {
                    SPARK_BLOCKS[0]
                } else {
                    let idx = ((rate / max) * (SPARK_BLOCKS.len() - 1) as f64).round() as usize;
                    SPARK_BLOCKS[idx.min(SPARK_BLOCKS.len() - 1)]
                }
            }
            _ => ' ',
        })
        .collect()
}

/// One line of text per cycle.
pub struct TextPresenter<W> {
    out: W,
}

impl<W: Write + Send> TextPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Format the status line shown for one series.
pub fn status_line(series: &RateSeries) -> String {
    let elapsed = series.points.last().map(|p| p.timestamp).unwrap_or(0.0);
    let rate = match series.latest_rate {
        Some(rate) => format!("{rate:>10.2} events/s"),
        None => format!("{:>10} events/s", "-"),
    };
    let start = series.points.len().saturating_sub(SPARK_WIDTH);
    format!(
        "[{elapsed:>8.1}s] {rate} |{spark:<width$}| {points} pts, {skipped}/{cycles} skipped",
        spark = sparkline(&series.points[start..]),
        width = SPARK_WIDTH,
        points = series.points.len(),
        skipped = series.skipped,
        cycles = series.cycles,
    )
}

impl<W: Write + Send> PresentationPort for TextPresenter<W> {
    fn present(&mut self, series: &RateSeries) {
        let line = status_line(series);
        if let Err(e) = writeln!(self.out, "{line}").and_then(|_| self.out.flush()) {
            warn!(error = %e, "failed to write status line");
        }
    }
}

/// One JSON document per cycle.
pub struct JsonPresenter<W> {
    out: W,
}

impl<W: Write + Send> JsonPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> PresentationPort for JsonPresenter<W> {
    fn present(&mut self, series: &RateSeries) {
        let result = serde_json::to_writer(&mut self.out, series)
            .map_err(std::io::Error::from)
            .and_then(|_| writeln!(self.out))
            .and_then(|_| self.out.flush());
        if let Err(e) = result {
            warn!(error = %e, "failed to write series");
        }
    }
}
