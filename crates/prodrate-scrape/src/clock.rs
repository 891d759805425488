//! Wall-clock source and tick alignment.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of time for the scheduler.
///
/// `now` is wall-clock time and only drives tick alignment. Sample
/// timestamps come from `monotonic`, which never goes backwards even when
/// the wall clock is stepped.
pub trait Clock: Send + Sync {
    /// Offset from the Unix epoch.
    fn now(&self) -> Duration;

    /// Offset from an arbitrary fixed origin; non-decreasing.
    fn monotonic(&self) -> Duration;
}

/// The operating system's clocks.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }

    fn monotonic(&self) -> Duration {
        self.origin.elapsed()
    }
}

#[derive(Debug, Default)]
struct ManualTime {
    wall: Duration,
    monotonic: Duration,
}

/// A clock that only moves when told to. Useful for tests and replays.
#[derive(Debug, Default)]
pub struct ManualClock {
    time: Mutex<ManualTime>,
}

impl ManualClock {
    /// Both the wall and the monotonic reading start at `start`.
    pub fn new(start: Duration) -> Self {
        Self {
            time: Mutex::new(ManualTime {
                wall: start,
                monotonic: start,
            }),
        }
    }

    /// Step the wall clock only, as an NTP correction would.
    pub fn set(&self, now: Duration) {
        self.time.lock().unwrap_or_else(|e| e.into_inner()).wall = now;
    }

    /// Let `by` pass on both clocks.
    pub fn advance(&self, by: Duration) {
        let mut time = self.time.lock().unwrap_or_else(|e| e.into_inner());
        time.wall += by;
        time.monotonic += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.time.lock().unwrap_or_else(|e| e.into_inner()).wall
    }

    fn monotonic(&self) -> Duration {
        self.time.lock().unwrap_or_else(|e| e.into_inner()).monotonic
    }
}

/// Delay until the next multiple of `interval` strictly after `now`.
///
/// Wake-ups stay phase-locked to the epoch, so a slow scrape shortens the
/// following sleep instead of pushing every later cycle back.
pub fn next_tick_delay(now: Duration, interval: Duration) -> Duration {
    let interval_ns = interval.as_nanos();
    if interval_ns == 0 {
        return Duration::ZERO;
    }
    let now_ns = now.as_nanos();
    let next_ns = (now_ns / interval_ns + 1) * interval_ns;
    u64::try_from(next_ns - now_ns)
        .map(Duration::from_nanos)
        .unwrap_or(interval)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_reaches_next_whole_second() {
        let now = Duration::from_millis(1_700_000_000_250);
        let delay = next_tick_delay(now, Duration::from_secs(1));
        assert_eq!(delay, Duration::from_millis(750));
        assert_eq!((now + delay).subsec_nanos(), 0);
    }

    #[test]
    fn on_boundary_waits_a_full_interval() {
        let delay = next_tick_delay(Duration::from_secs(42), Duration::from_secs(1));
        assert_eq!(delay, Duration::from_secs(1));
    }

    #[test]
    fn slow_scrape_does_not_accumulate_drift() {
        // Cycle started at 10.000s and the fetch took 900ms.
        let delay = next_tick_delay(Duration::from_millis(10_900), Duration::from_secs(1));
        assert_eq!(delay, Duration::from_millis(100));
    }

    #[test]
    fn overrun_skips_to_following_boundary() {
        // A fetch that ran longer than one interval lands on the next free tick.
        let delay = next_tick_delay(Duration::from_millis(12_300), Duration::from_secs(1));
        assert_eq!(delay, Duration::from_millis(700));
    }

    #[test]
    fn sub_second_intervals_align() {
        let delay = next_tick_delay(Duration::from_millis(1_130), Duration::from_millis(250));
        assert_eq!(delay, Duration::from_millis(120));
    }

    #[test]
    fn zero_interval_never_sleeps() {
        assert_eq!(next_tick_delay(Duration::from_secs(5), Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn manual_clock_moves_on_demand() {
        let clock = ManualClock::new(Duration::from_secs(100));
        assert_eq!(clock.now(), Duration::from_secs(100));
        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now(), Duration::from_millis(101_500));
        assert_eq!(clock.monotonic(), Duration::from_millis(101_500));
    }

    #[test]
    fn manual_wall_step_leaves_monotonic_alone() {
        let clock = ManualClock::new(Duration::from_secs(100));
        clock.set(Duration::from_secs(7));
        assert_eq!(clock.now(), Duration::from_secs(7));
        assert_eq!(clock.monotonic(), Duration::from_secs(100));
    }

    #[test]
    fn system_clock_is_past_epoch() {
        let clock = SystemClock::new();
        assert!(clock.now() > Duration::from_secs(1_600_000_000));
        let first = clock.monotonic();
        assert!(clock.monotonic() >= first);
    }
}
