//! The randomization policy: when and how the simulated flow changes.

use fluidflow_types::{FlowParams, Timestamp};
use rand::distr::{Distribution, Uniform};
use rand::Rng;

use crate::error::SimulatorError;

/// Sampling range for the flow value, half-open `[low, high)`.
///
/// A degenerate range (`low == high`) always yields `low`. Ranges with
/// `low > high` or non-finite bounds cannot be built.
#[derive(Debug, Clone, Copy)]
pub struct FlowRange {
    low: f32,
    high: f32,
    dist: Option<Uniform<f32>>,
}

impl FlowRange {
    pub fn new(low: f32, high: f32) -> Result<Self, SimulatorError> {
        let invalid = || SimulatorError::InvalidRange {
            min: low,
            max: high,
        };
        if !low.is_finite() || !high.is_finite() || low > high {
            return Err(invalid());
        }
        let dist = if low < high {
            Some(Uniform::new(low, high).map_err(|_| invalid())?)
        } else {
            None
        };
        Ok(Self { low, high, dist })
    }

    pub fn from_params(params: &FlowParams) -> Result<Self, SimulatorError> {
        Self::new(params.min_flow, params.max_flow)
    }

    pub fn low(&self) -> f32 {
        self.low
    }

    pub fn high(&self) -> f32 {
        self.high
    }

    pub fn midpoint(&self) -> f32 {
        self.low + (self.high - self.low) / 2.0
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        match &self.dist {
            Some(dist) => dist.sample(rng),
            None => self.low,
        }
    }
}

impl PartialEq for FlowRange {
    fn eq(&self, other: &Self) -> bool {
        self.low == other.low && self.high == other.high
    }
}

/// Holds the current flow value and decides when to draw a new one.
///
/// A new value is drawn only once more than `change_interval_micros` has
/// passed since the previous draw. Range changes are applied lazily: they
/// shape the next draw and never touch the value currently held.
#[derive(Debug)]
pub struct RandomizationPolicy<R> {
    range: FlowRange,
    change_interval_micros: i64,
    current: f32,
    last_change: Timestamp,
    rng: R,
}

impl<R: Rng> RandomizationPolicy<R> {
    /// Build the policy with the range midpoint as the initial value.
    ///
    /// `started_at` counts as the last change, so the first draw happens one
    /// full interval after construction.
    pub fn new(params: &FlowParams, started_at: Timestamp, rng: R) -> Result<Self, SimulatorError> {
        let range = FlowRange::from_params(params)?;
        Ok(Self {
            range,
            change_interval_micros: params.change_interval_micros,
            current: range.midpoint(),
            last_change: started_at,
            rng,
        })
    }

    /// Adopt new parameters for future draws.
    ///
    /// The interval is always taken. An unusable range is rejected and the
    /// previous range stays in effect.
    pub fn refresh_configuration(&mut self, params: &FlowParams) -> Result<(), SimulatorError> {
        self.change_interval_micros = params.change_interval_micros;
        self.range = FlowRange::from_params(params)?;
        Ok(())
    }

    /// Draw a new value if the change interval has been exceeded.
    ///
    /// Returns the new value when one was drawn.
    pub fn maybe_regenerate(&mut self, now: Timestamp) -> Option<f32> {
        let elapsed = now.saturating_since(self.last_change);
        if !elapsed.exceeds(self.change_interval_micros) {
            return None;
        }

        let flow_rate = self.range.sample(&mut self.rng);
        self.current = flow_rate;
        self.last_change = now;
        tracing::info!(flow_rate, "Flow rate changed to: {:.2} l/min", flow_rate);
        Some(flow_rate)
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn last_change(&self) -> Timestamp {
        self.last_change
    }

    pub fn range(&self) -> FlowRange {
        self.range
    }

    pub fn change_interval_micros(&self) -> i64 {
        self.change_interval_micros
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn params(min_flow: f32, max_flow: f32, change_interval_micros: i64) -> FlowParams {
        FlowParams {
            min_flow,
            max_flow,
            change_interval_micros,
        }
    }

    fn policy(p: FlowParams) -> RandomizationPolicy<StdRng> {
        RandomizationPolicy::new(&p, Timestamp::ZERO, StdRng::seed_from_u64(7)).unwrap()
    }

    #[test]
    fn samples_stay_in_half_open_range() {
        let mut rng = StdRng::seed_from_u64(1);
        for (low, high) in [(1.0, 2.0), (0.0, 0.001), (-5.0, 5.0), (100.0, 250.5)] {
            let range = FlowRange::new(low, high).unwrap();
            for _ in 0..10_000 {
                let v = range.sample(&mut rng);
                assert!(v >= low && v < high, "{v} outside [{low}, {high})");
            }
        }
    }

    #[test]
    fn degenerate_range_yields_its_bound() {
        let range = FlowRange::new(3.5, 3.5).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(range.sample(&mut rng), 3.5);
        assert_eq!(range.midpoint(), 3.5);
    }

    #[test]
    fn inverted_or_non_finite_ranges_are_rejected() {
        assert!(matches!(
            FlowRange::new(2.0, 1.0),
            Err(SimulatorError::InvalidRange { min, max }) if min == 2.0 && max == 1.0
        ));
        assert!(FlowRange::new(f32::NAN, 1.0).is_err());
        assert!(FlowRange::new(0.0, f32::INFINITY).is_err());
        assert!(FlowRange::new(-f32::MAX, f32::MAX).is_err());
    }

    #[test]
    fn initial_value_is_midpoint() {
        let p = policy(FlowParams::default());
        assert_eq!(p.current(), 1.5);
        assert_eq!(p.last_change(), Timestamp::ZERO);
    }

    #[test]
    fn no_regeneration_at_exact_interval() {
        let mut p = policy(params(1.0, 2.0, 1_000));
        assert_eq!(p.maybe_regenerate(Timestamp::from_micros(999)), None);
        assert_eq!(p.maybe_regenerate(Timestamp::from_micros(1_000)), None);
        assert_eq!(p.current(), 1.5);
    }

    #[test]
    fn regenerates_once_interval_exceeded() {
        let mut p = policy(params(1.0, 2.0, 1_000));
        let drawn = p.maybe_regenerate(Timestamp::from_micros(1_001)).unwrap();
        assert!((1.0..2.0).contains(&drawn));
        assert_eq!(p.current(), drawn);
        assert_eq!(p.last_change(), Timestamp::from_micros(1_001));

        // The interval restarts from the draw.
        assert_eq!(p.maybe_regenerate(Timestamp::from_micros(2_001)), None);
        assert!(p.maybe_regenerate(Timestamp::from_micros(2_002)).is_some());
    }

    #[test]
    fn zero_interval_regenerates_whenever_time_moves() {
        let mut p = policy(params(1.0, 2.0, 0));
        for tick in 1..=50u64 {
            let v = p.maybe_regenerate(Timestamp::from_micros(tick * 100_000));
            assert!(matches!(v, Some(v) if (1.0..2.0).contains(&v)));
        }
        // Same instant as the last draw: nothing has elapsed.
        assert_eq!(p.maybe_regenerate(Timestamp::from_micros(5_000_000)), None);
    }

    #[test]
    fn negative_interval_regenerates_every_call() {
        let mut p = policy(params(1.0, 2.0, -1));
        assert!(p.maybe_regenerate(Timestamp::ZERO).is_some());
        assert!(p.maybe_regenerate(Timestamp::ZERO).is_some());
    }

    #[test]
    fn refresh_is_lazy() {
        let mut p = policy(params(1.0, 2.0, 1_000));
        p.refresh_configuration(&params(10.0, 20.0, 1_000)).unwrap();

        assert_eq!(p.current(), 1.5, "current value untouched by refresh");
        assert_eq!(p.maybe_regenerate(Timestamp::from_micros(500)), None);
        assert_eq!(p.current(), 1.5);

        let v = p.maybe_regenerate(Timestamp::from_micros(1_001)).unwrap();
        assert!((10.0..20.0).contains(&v));
    }

    #[test]
    fn refresh_with_inverted_range_keeps_previous_range() {
        let mut p = policy(params(1.0, 2.0, 1_000));
        let result = p.refresh_configuration(&params(5.0, 4.0, 10));

        assert!(matches!(result, Err(SimulatorError::InvalidRange { .. })));
        assert_eq!(p.range(), FlowRange::new(1.0, 2.0).unwrap());
        assert_eq!(p.change_interval_micros(), 10, "interval applies regardless");
    }

    #[test]
    fn same_seed_same_sequence() {
        let mut a = policy(params(1.0, 2.0, 0));
        let mut b = policy(params(1.0, 2.0, 0));
        for tick in 1..=20u64 {
            let now = Timestamp::from_micros(tick);
            assert_eq!(a.maybe_regenerate(now), b.maybe_regenerate(now));
        }
    }

    #[test]
    fn construction_rejects_inverted_defaults() {
        let result = RandomizationPolicy::new(
            &params(2.0, 1.0, 1_000),
            Timestamp::ZERO,
            StdRng::seed_from_u64(0),
        );
        assert!(result.is_err());
    }
}
