//! Finite-difference rate estimation over a sample window.
//!
//! Each output point pairs a sample's timestamp with the counter's change
//! per second since the previous sample. Undefined points (no predecessor,
//! or a stalled clock) are `None` so presenters can draw them as gaps.

use serde::{Deserialize, Serialize};

use crate::window::Sample;

/// What to do when the counter goes backwards (producer restart).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CounterResetPolicy {
    /// Emit the negative rate as computed.
    #[default]
    PassThrough,
    /// Replace negative rates with zero.
    Clamp,
    /// Replace negative rates with an undefined point.
    Gap,
}

impl std::str::FromStr for CounterResetPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pass-through" | "passthrough" => Ok(Self::PassThrough),
            "clamp" => Ok(Self::Clamp),
            "gap" => Ok(Self::Gap),
            other => Err(format!(
                "unknown counter reset policy '{other}' (expected pass-through, clamp, or gap)"
            )),
        }
    }
}

/// One point of the derived series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatePoint {
    /// Seconds since the session started.
    pub timestamp: f64,
    /// Events per second since the previous sample, if defined.
    pub rate: Option<f64>,
}

/// Stateless rate calculator parameterised by its reset policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateEstimator {
    reset_policy: CounterResetPolicy,
}

impl RateEstimator {
    pub fn new(reset_policy: CounterResetPolicy) -> Self {
        Self { reset_policy }
    }

    pub fn reset_policy(&self) -> CounterResetPolicy {
        self.reset_policy
    }

    /// Compute one rate point per input sample.
    pub fn compute(&self, samples: &[Sample]) -> Vec<RatePoint> {
        let mut points = Vec::with_capacity(samples.len());
        let mut prev: Option<&Sample> = None;

        for sample in samples {
            let rate = prev.and_then(|p| self.rate_between(p, sample));
            points.push(RatePoint {
                timestamp: sample.timestamp,
                rate,
            });
            prev = Some(sample);
        }

        points
    }

    /// Most recent defined rate in the window.
    pub fn latest(&self, samples: &[Sample]) -> Option<f64> {
        samples
            .windows(2)
            .rev()
            .find_map(|pair| self.rate_between(&pair[0], &pair[1]))
    }

    /// `None` for a zero time delta or a non-finite result (`NaN`/`Inf` samples).
    fn rate_between(&self, prev: &Sample, cur: &Sample) -> Option<f64> {
        let dt = cur.timestamp - prev.timestamp;
        if dt == 0.0 {
            return None;
        }

        let rate = (cur.value - prev.value) / dt;
        if !rate.is_finite() {
            return None;
        }
        if rate < 0.0 {
            return match self.reset_policy {
                CounterResetPolicy::PassThrough => Some(rate),
                CounterResetPolicy::Clamp => Some(0.0),
                CounterResetPolicy::Gap => None,
            };
        }
        Some(rate)
    }
}
