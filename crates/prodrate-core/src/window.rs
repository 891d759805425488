//! Bounded sliding window of counter samples.

use std::collections::VecDeque;

/// Default window capacity: five minutes at one scrape per second.
pub const DEFAULT_MAX_POINTS: usize = 300;

/// A single observation of the cumulative counter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Seconds since the session started.
    pub timestamp: f64,
    /// Cumulative counter value at `timestamp`.
    pub value: f64,
}

impl Sample {
    pub fn new(timestamp: f64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Fixed-capacity FIFO of samples in arrival order.
///
/// The window does not sort. Callers push in non-decreasing timestamp
/// order; the scheduler guarantees this by running one cycle at a time.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleWindow {
    /// Create an empty window. A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest once the window is full.
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Copy the current contents, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    /// Most recently pushed sample.
    pub fn latest(&self) -> Option<Sample> {
        self.samples.back().copied()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_POINTS)
    }
}
