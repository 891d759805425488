//! prodrate-scrape — the polling half of the scrape-and-derive loop.
//!
//! Fetches the producer's `/metrics` page on a fixed, wall-clock aligned
//! cadence and feeds the extracted counter into a session-owned window.
//!
//! # Architecture
//!
//! ```text
//! ScrapeScheduler::run()
//!   ├── sleep until next interval boundary (drift corrected)
//!   ├── MetricsSource::fetch() → payload        (HttpFetcher)
//!   ├── exposition::extract() → Option<f64>
//!   ├── Session.window.push(Sample)
//!   └── PresentationPort::present(&RateSeries)   (WatchPresenter, closures)
//! ```
//!
//! A failed fetch or a malformed payload skips the cycle; the loop only
//! stops when its shutdown signal fires.

pub mod clock;
pub mod error;
pub mod fetch;
pub mod present;
pub mod scheduler;

pub use clock::{next_tick_delay, Clock, ManualClock, SystemClock};
pub use error::{FetchError, ScrapeError};
pub use fetch::{FetchFuture, HttpFetcher, MetricsSource};
pub use present::{PresentationPort, RateSeries, WatchPresenter};
pub use scheduler::{CycleOutcome, ScrapeScheduler, Session};
