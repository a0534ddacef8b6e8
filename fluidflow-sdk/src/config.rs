//! Serializable configuration for a simulator task.

use std::path::PathBuf;
use std::time::Duration;

use fluidflow_types::FlowParams;
use serde::{Deserialize, Serialize};

use crate::error::SimulatorError;
use crate::simulator::{DEFAULT_PERIOD, DEFAULT_TOPIC, MODULE_NAME};

/// Everything needed to start one simulator task.
///
/// Missing fields take their defaults, so an empty document is a valid
/// configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Name the task registers under.
    pub module_name: String,

    /// Bus topic samples are published on.
    pub topic: String,

    /// Tick period in microseconds.
    pub period_micros: u64,

    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,

    /// Initial parameter values.
    pub params: FlowParams,

    /// Where published samples are forwarded.
    pub outputs: Vec<OutputConfig>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            module_name: MODULE_NAME.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            period_micros: DEFAULT_PERIOD.as_micros() as u64,
            seed: None,
            params: FlowParams::default(),
            outputs: Vec::new(),
        }
    }
}

impl SimulatorConfig {
    pub fn period(&self) -> Duration {
        Duration::from_micros(self.period_micros)
    }

    /// Check the values a task cannot start with.
    pub fn validate(&self) -> Result<(), SimulatorError> {
        if self.period_micros == 0 {
            return Err(SimulatorError::InvalidPeriod);
        }
        if self.module_name.trim().is_empty() {
            return Err(SimulatorError::Config("module_name must not be empty".into()));
        }
        if self.topic.trim().is_empty() {
            return Err(SimulatorError::Config("topic must not be empty".into()));
        }
        if !self.params.has_valid_range() {
            return Err(SimulatorError::InvalidRange {
                min: self.params.min_flow,
                max: self.params.max_flow,
            });
        }
        Ok(())
    }
}

/// A configured sample sink. See [`crate::Output`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum OutputConfig {
    /// Overwrite a JSON file with the latest sample.
    File { path: PathBuf },
    /// Stream newline-delimited JSON to a TCP endpoint.
    Tcp { addr: String },
    /// Log every sample at info level.
    Log,
}
