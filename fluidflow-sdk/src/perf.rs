//! Elapsed-time performance counter for the task cycle.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Counts invocations of a code section and how long they took.
///
/// All fields are atomics so a status reader can take a summary while the
/// task keeps recording.
#[derive(Debug)]
pub struct PerfCounter {
    name: String,
    events: AtomicU64,
    total_nanos: AtomicU64,
    max_nanos: AtomicU64,
    last_nanos: AtomicU64,
}

impl PerfCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            events: AtomicU64::new(0),
            total_nanos: AtomicU64::new(0),
            max_nanos: AtomicU64::new(0),
            last_nanos: AtomicU64::new(0),
        }
    }

    /// Start timing a section; the elapsed time is recorded when the guard drops.
    pub fn begin(&self) -> PerfGuard<'_> {
        PerfGuard {
            counter: self,
            started: Instant::now(),
        }
    }

    pub fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.events.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
        self.max_nanos.fetch_max(nanos, Ordering::Relaxed);
        self.last_nanos.store(nanos, Ordering::Relaxed);
    }

    pub fn summary(&self) -> PerfSummary {
        let events = self.events.load(Ordering::Relaxed);
        let total = self.total_nanos.load(Ordering::Relaxed);
        PerfSummary {
            name: self.name.clone(),
            events,
            mean: Duration::from_nanos(total.checked_div(events).unwrap_or(0)),
            max: Duration::from_nanos(self.max_nanos.load(Ordering::Relaxed)),
            last: Duration::from_nanos(self.last_nanos.load(Ordering::Relaxed)),
        }
    }
}

/// Guard that records the elapsed time into its counter when dropped.
pub struct PerfGuard<'a> {
    counter: &'a PerfCounter,
    started: Instant,
}

impl Drop for PerfGuard<'_> {
    fn drop(&mut self) {
        self.counter.record(self.started.elapsed());
    }
}

/// Point-in-time view of a [`PerfCounter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerfSummary {
    pub name: String,
    pub events: u64,
    pub mean: Duration,
    pub max: Duration,
    pub last: Duration,
}

impl fmt::Display for PerfSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} events, {} avg, {} max, {} last",
            self.name,
            self.events,
            format_duration(self.mean),
            format_duration(self.max),
            format_duration(self.last),
        )
    }
}

/// Render `d` in the coarsest unit it fills at least once. Sub-microsecond
/// values are shown as whole nanoseconds.
pub fn format_duration(d: Duration) -> String {
    const SCALES: [(u128, &str); 3] = [(1_000_000_000, "s"), (1_000_000, "ms"), (1_000, "µs")];

    let nanos = d.as_nanos();
    SCALES
        .iter()
        .find(|(per_unit, _)| nanos >= *per_unit)
        .map(|(per_unit, unit)| format!("{:.2}{unit}", nanos as f64 / *per_unit as f64))
        .unwrap_or_else(|| format!("{nanos}ns"))
}
