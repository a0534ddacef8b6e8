//! # fluidflow-cli
//!
//! Process-level glue for the fluid-flow simulator: layered configuration,
//! duration parsing and the interactive console behind the `fluidflow-sim`
//! binary.
//!
//! ```text
//! $ fluidflow-sim --config fluidflow.toml --start
//! > status
//! fluidflow_simulator #1: running on 'fluid_flow'
//!   flow rate: 1.50 l/min at 3400000 us
//!   ...
//! > param set FFS_MAX_FLOW 4.0
//! FFS_MAX_FLOW = 4.0000
//! ```

pub mod console;
pub mod duration;
pub mod settings;

pub use console::{usage, Command, Console, Flow};
pub use settings::{load, Overrides};
