//! The simulated flow sensor task.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fluidflow_types::{FlowParams, FlowSample, Timestamp};
use parking_lot::RwLock;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bus::SamplePublisher;
use crate::clock::{Clock, MonotonicClock};
use crate::error::SimulatorError;
use crate::params::{ParamSubscription, ParameterStore};
use crate::perf::PerfCounter;
use crate::policy::RandomizationPolicy;
use crate::scheduler::{PeriodicTask, TickOutcome};

/// Name the task registers under.
pub const MODULE_NAME: &str = "fluidflow_simulator";

/// Topic samples are published on.
pub const DEFAULT_TOPIC: &str = "fluid_flow";

/// Tick period: 100 ms (10 Hz).
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(100);

/// Cooperative stop request shared between a task and its controller.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters and last values a task exposes to status readers.
#[derive(Debug, Default)]
pub struct TaskStats {
    published: AtomicU64,
    regenerations: AtomicU64,
    rejected_updates: AtomicU64,
    stopped: AtomicBool,
    last_sample: RwLock<Option<FlowSample>>,
    active_params: RwLock<FlowParams>,
}

impl TaskStats {
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    pub fn regenerations(&self) -> u64 {
        self.regenerations.load(Ordering::Relaxed)
    }

    /// Parameter updates whose range could not be applied.
    pub fn rejected_updates(&self) -> u64 {
        self.rejected_updates.load(Ordering::Relaxed)
    }

    /// Whether the task has observed its stop request and deregistered.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn last_sample(&self) -> Option<FlowSample> {
        *self.last_sample.read()
    }

    /// Parameters the task applied most recently.
    pub fn active_params(&self) -> FlowParams {
        *self.active_params.read()
    }
}

/// A simulated flow sensor.
///
/// On each tick the task:
/// 1. exits if a stop was requested, publishing nothing;
/// 2. applies pending parameter updates to the randomization range;
/// 3. draws a new flow value if the change interval has been exceeded;
/// 4. publishes the current value.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use std::time::Duration;
/// use fluidflow_sdk::{Bus, FlowSimulator, ManualClock};
///
/// let bus = Bus::new();
/// let mut rx = bus.subscribe("fluid_flow");
/// let clock = ManualClock::new();
///
/// let mut sim = FlowSimulator::builder(Arc::new(bus))
///     .clock(Arc::new(clock.clone()))
///     .seed(42)
///     .build()
///     .unwrap();
///
/// clock.advance(Duration::from_millis(100));
/// sim.tick();
/// assert_eq!(rx.try_recv().unwrap().flow_rate, 1.5);
/// ```
#[derive(Debug)]
pub struct FlowSimulator<R = StdRng> {
    topic: String,
    policy: RandomizationPolicy<R>,
    params: ParamSubscription,
    publisher: Arc<dyn SamplePublisher>,
    clock: Arc<dyn Clock>,
    stop: StopSignal,
    stats: Arc<TaskStats>,
    perf: Arc<PerfCounter>,
}

impl FlowSimulator<StdRng> {
    /// Create a builder publishing through `publisher`.
    pub fn builder(publisher: Arc<dyn SamplePublisher>) -> SimulatorBuilder {
        SimulatorBuilder::new(publisher)
    }
}

impl<R: Rng> FlowSimulator<R> {
    /// Run one cycle. See the type docs for the sequence.
    pub fn tick(&mut self) -> TickOutcome {
        let perf = self.perf.clone();
        let _cycle = perf.begin();

        if self.stop.is_requested() {
            self.stats.stopped.store(true, Ordering::Release);
            tracing::debug!(topic = %self.topic, "stop requested, leaving schedule");
            return TickOutcome::Exit;
        }

        if let Some(params) = self.params.check() {
            self.refresh_configuration(&params);
        }

        let now = self.clock.now();
        if self.policy.maybe_regenerate(now).is_some() {
            self.stats.regenerations.fetch_add(1, Ordering::Relaxed);
        }
        self.publish(now);

        TickOutcome::Continue
    }

    /// Apply new parameters to future draws; the current value is kept.
    pub fn refresh_configuration(&mut self, params: &FlowParams) {
        match self.policy.refresh_configuration(params) {
            Ok(()) => {
                *self.stats.active_params.write() = *params;
                tracing::debug!(
                    min_flow = params.min_flow,
                    max_flow = params.max_flow,
                    change_interval_us = params.change_interval_micros,
                    "parameters applied"
                );
            }
            Err(e) => {
                let range = self.policy.range();
                *self.stats.active_params.write() = FlowParams {
                    min_flow: range.low(),
                    max_flow: range.high(),
                    change_interval_micros: params.change_interval_micros,
                };
                self.stats.rejected_updates.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %e, "keeping previous flow range");
            }
        }
    }

    fn publish(&self, now: Timestamp) {
        let sample = FlowSample::new(now, self.policy.current());
        self.publisher.publish(&self.topic, sample);
        *self.stats.last_sample.write() = Some(sample);
        self.stats.published.fetch_add(1, Ordering::Relaxed);
    }

    /// Request termination; the next tick deregisters.
    pub fn stop(&self) {
        self.stop.request();
    }

    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    pub fn stats(&self) -> Arc<TaskStats> {
        self.stats.clone()
    }

    pub fn perf(&self) -> Arc<PerfCounter> {
        self.perf.clone()
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn current_flow_rate(&self) -> f32 {
        self.policy.current()
    }

    pub fn policy(&self) -> &RandomizationPolicy<R> {
        &self.policy
    }
}

impl<R: Rng + Send + 'static> PeriodicTask for FlowSimulator<R> {
    fn run(&mut self) -> TickOutcome {
        self.tick()
    }
}

/// Builder for [`FlowSimulator`].
#[derive(Debug)]
pub struct SimulatorBuilder {
    publisher: Arc<dyn SamplePublisher>,
    topic: Option<String>,
    name: Option<String>,
    store: Option<ParameterStore>,
    clock: Option<Arc<dyn Clock>>,
    seed: Option<u64>,
}

impl SimulatorBuilder {
    pub fn new(publisher: Arc<dyn SamplePublisher>) -> Self {
        Self {
            publisher,
            topic: None,
            name: None,
            store: None,
            clock: None,
            seed: None,
        }
    }

    /// Topic to publish on. Defaults to [`DEFAULT_TOPIC`].
    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Name used for the perf counter. Defaults to [`MODULE_NAME`].
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Parameter store to read and watch. Defaults to a private store with
    /// default values.
    pub fn params(mut self, store: ParameterStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Time source. Defaults to [`MonotonicClock`].
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fixed RNG seed. Without one the RNG is seeded from the OS.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<FlowSimulator<StdRng>, SimulatorError> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        self.build_with_rng(rng)
    }

    /// Build with a caller-supplied RNG.
    pub fn build_with_rng<R: Rng>(self, rng: R) -> Result<FlowSimulator<R>, SimulatorError> {
        let store = self.store.unwrap_or_default();
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let name = self.name.unwrap_or_else(|| MODULE_NAME.to_string());

        // Subscribe before reading so an update racing construction is not lost.
        let params = store.subscribe();
        let initial = params.copy();
        let policy = RandomizationPolicy::new(&initial, clock.now(), rng)?;

        let stats = Arc::new(TaskStats::default());
        *stats.active_params.write() = initial;

        Ok(FlowSimulator {
            topic: self.topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            policy,
            params,
            publisher: self.publisher,
            clock,
            stop: StopSignal::new(),
            stats,
            perf: Arc::new(PerfCounter::new(format!("{name}: cycle"))),
        })
    }
}
