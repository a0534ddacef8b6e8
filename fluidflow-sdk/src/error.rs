//! Error types for the simulator.

use fluidflow_types::{ParamId, ParseParamError};
use thiserror::Error;

use crate::registry::TaskId;

/// Errors reported while starting, configuring or controlling a task.
///
/// Once a task is running nothing in the tick path fails; these only
/// surface from construction, registration and control calls.
#[derive(Debug, Error)]
pub enum SimulatorError {
    /// The flow bounds cannot form a sampling range.
    #[error("invalid flow range: min {min} must not exceed max {max} and both must be finite")]
    InvalidRange { min: f32, max: f32 },

    /// The tick period is zero.
    #[error("invalid tick period: must be greater than zero")]
    InvalidPeriod,

    /// No scheduler was available to register the task with.
    #[error("scheduler unavailable: {0}")]
    Scheduler(String),

    /// A task with this name is already registered and running.
    #[error("{0} is already running")]
    AlreadyRunning(String),

    /// The task handle does not refer to a live task.
    #[error("task {0} is not running")]
    NotRunning(TaskId),

    /// The configuration is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A parameter update was rejected.
    #[error(transparent)]
    Param(#[from] ParamError),
}

/// Errors from the parameter store.
#[derive(Debug, Error)]
pub enum ParamError {
    /// Name or value did not parse.
    #[error(transparent)]
    Parse(#[from] ParseParamError),

    /// An integer parameter was given a fractional value.
    #[error("{0} expects an integer value")]
    TypeMismatch(ParamId),
}
