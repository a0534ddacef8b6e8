//! The flow measurement published on every tick.

use crate::Timestamp;

/// One simulated flow-sensor reading.
///
/// A sample is created fresh on every tick and handed to the bus; nothing
/// keeps it afterwards. `healthy` is always `true` for simulated readings and
/// exists so consumers can treat simulated and real sensors alike.
///
/// # Example
///
/// ```rust
/// use fluidflow_types::{FlowSample, Timestamp};
///
/// let sample = FlowSample::new(Timestamp::from_micros(2_000_000), 1.73);
/// assert_eq!(sample.timestamp.as_micros(), 2_000_000);
/// assert!(sample.healthy);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct FlowSample {
    /// Monotonic time the sample was taken.
    #[cfg_attr(feature = "minicbor", n(0))]
    pub timestamp: Timestamp,

    /// Flow rate in litres per minute.
    #[cfg_attr(feature = "minicbor", n(1))]
    pub flow_rate: f32,

    /// Sensor health. Constant `true` for the simulator.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub healthy: bool,
}

impl FlowSample {
    /// Create a healthy sample.
    pub const fn new(timestamp: Timestamp, flow_rate: f32) -> Self {
        Self {
            timestamp,
            flow_rate,
            healthy: true,
        }
    }
}
