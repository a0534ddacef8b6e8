//! # fluidflow-sdk
//!
//! A simulated fluid-flow sensor: a periodic task that publishes a
//! pseudo-random flow rate (litres/minute) to a data bus at 10 Hz, changing
//! the value at a configurable interval.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fluidflow_sdk::{Bus, Output, ParameterStore, SimulatorConfig, TaskRegistry};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let registry = TaskRegistry::new(Bus::new(), ParameterStore::default());
//!
//!     // Watch what gets published
//!     let (output, mut rx) = Output::channel(16);
//!     output.attach(registry.bus(), "fluid_flow");
//!
//!     // Start the simulator on the current runtime
//!     let id = registry.start(&SimulatorConfig::default()).unwrap();
//!
//!     while let Some(sample) = rx.recv().await {
//!         println!("{:.2} l/min", sample.flow_rate);
//!     }
//!
//!     registry.stop(id).unwrap();
//! }
//! ```
//!
//! ## Pieces
//!
//! - [`RandomizationPolicy`]: holds the current value and decides when to redraw it
//! - [`ParameterStore`]: the three tunables, with edge-triggered update notification
//! - [`FlowSimulator`]: the task body run once per tick
//! - [`WorkQueue`]: runs a task body on a fixed period
//! - [`Bus`]: topic-based broadcast of published samples
//! - [`TaskRegistry`]: starts, stops and reports on tasks

mod bus;
mod clock;
mod config;
mod error;
mod output;
mod params;
mod perf;
mod policy;
mod registry;
mod scheduler;
mod simulator;

pub use bus::{Bus, SamplePublisher, DEFAULT_CAPACITY};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{OutputConfig, SimulatorConfig};
pub use error::{ParamError, SimulatorError};
pub use output::Output;
pub use params::{ParamSubscription, ParameterStore};
pub use perf::{format_duration, PerfCounter, PerfGuard, PerfSummary};
pub use policy::{FlowRange, RandomizationPolicy};
pub use registry::{TaskId, TaskRegistry, TaskState, TaskStatus};
pub use scheduler::{PeriodicTask, ScheduleHandle, TickOutcome, WorkQueue};
pub use simulator::{
    FlowSimulator, SimulatorBuilder, StopSignal, TaskStats, DEFAULT_PERIOD, DEFAULT_TOPIC,
    MODULE_NAME,
};

// Re-export types for convenience
pub use fluidflow_types::{
    FlowParams, FlowSample, Microseconds, ParamId, ParamValue, ParseParamError, Timestamp,
};
