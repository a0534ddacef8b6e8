//! Monotonic time representation.
//!
//! Timestamps and durations are carried as whole microseconds so that the
//! published record has the same layout on every target: a `u64` that
//! covers ~584,000 years of uptime.

use core::ops::Add;
use core::time::Duration;

/// Duration in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(transparent))]
pub struct Microseconds(#[cfg_attr(feature = "minicbor", n(0))] pub u64);

impl Microseconds {
    pub const ZERO: Self = Self(0);

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Whether this span is strictly longer than a signed interval.
    ///
    /// Negative intervals are exceeded by every span, including zero.
    pub fn exceeds(&self, interval_micros: i64) -> bool {
        match u64::try_from(interval_micros) {
            Ok(interval) => self.0 > interval,
            Err(_) => true,
        }
    }
}

impl From<Duration> for Microseconds {
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_micros()).unwrap_or(u64::MAX))
    }
}

impl From<Microseconds> for Duration {
    fn from(m: Microseconds) -> Self {
        Duration::from_micros(m.0)
    }
}

/// A point on a monotonic clock, in microseconds since the clock's origin.
///
/// The origin is arbitrary (process start, simulation start); only
/// differences between timestamps from the same clock are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
#[cfg_attr(feature = "minicbor", cbor(transparent))]
pub struct Timestamp(#[cfg_attr(feature = "minicbor", n(0))] pub u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, or zero if `earlier` is in the future.
    pub const fn saturating_since(&self, earlier: Timestamp) -> Microseconds {
        Microseconds(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Microseconds> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Microseconds) -> Timestamp {
        Timestamp(self.0.saturating_add(rhs.0))
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        self + Microseconds::from(rhs)
    }
}
