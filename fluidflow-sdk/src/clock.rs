//! Monotonic time sources for the simulator.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fluidflow_types::{Microseconds, Timestamp};

/// Source of monotonic timestamps.
///
/// The task reads the clock once per tick and uses that reading for both
/// the regeneration check and the published sample.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> Timestamp;
}

/// Clock backed by the tokio timer.
///
/// Timestamps are microseconds since the clock was created. Because it reads
/// `tokio::time::Instant`, a paused test runtime drives it deterministically.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let elapsed = tokio::time::Instant::now().duration_since(self.origin);
        Timestamp::from_micros(Microseconds::from(elapsed).as_micros())
    }
}

/// Manually driven clock for deterministic tests and benchmarks.
///
/// Clones share the same reading, so a test can keep one clone and hand the
/// other to the task.
///
/// ```rust
/// use fluidflow_sdk::{Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::new();
/// clock.advance(Duration::from_millis(100));
/// assert_eq!(clock.now().as_micros(), 100_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    micros: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.micros
            .fetch_add(Microseconds::from(by).as_micros(), Ordering::SeqCst);
    }

    pub fn set(&self, at: Timestamp) {
        self.micros.store(at.as_micros(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.micros.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let shared = clock.clone();

        clock.advance(Duration::from_millis(250));
        assert_eq!(shared.now(), Timestamp::from_micros(250_000));

        shared.set(Timestamp::from_micros(5));
        assert_eq!(clock.now(), Timestamp::from_micros(5));
    }

    #[tokio::test(start_paused = true)]
    async fn monotonic_clock_follows_tokio_time() {
        let clock = MonotonicClock::new();
        assert_eq!(clock.now(), Timestamp::ZERO);

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(clock.now(), Timestamp::from_micros(100_000));
    }
}
