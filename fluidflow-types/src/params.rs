//! Tunable parameters of the flow simulation.

use core::fmt;
use core::str::FromStr;

/// Default lower bound of the simulated flow, l/min.
pub const DEFAULT_MIN_FLOW: f32 = 1.0;

/// Default upper bound of the simulated flow, l/min.
pub const DEFAULT_MAX_FLOW: f32 = 2.0;

/// Default time between value changes, in microseconds (10 s).
pub const DEFAULT_CHANGE_INTERVAL_MICROS: i64 = 10_000_000;

/// The three tunables that drive the randomization policy.
///
/// Nothing here enforces `min_flow <= max_flow` or a positive interval;
/// the simulator decides what to do with such values when it applies them.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct FlowParams {
    /// Lower bound of the flow range (inclusive).
    #[cfg_attr(feature = "minicbor", n(0))]
    pub min_flow: f32,

    /// Upper bound of the flow range (exclusive).
    #[cfg_attr(feature = "minicbor", n(1))]
    pub max_flow: f32,

    /// Minimum time between two regenerations of the value.
    ///
    /// Zero or negative means every tick regenerates.
    #[cfg_attr(feature = "minicbor", n(2))]
    pub change_interval_micros: i64,
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            min_flow: DEFAULT_MIN_FLOW,
            max_flow: DEFAULT_MAX_FLOW,
            change_interval_micros: DEFAULT_CHANGE_INTERVAL_MICROS,
        }
    }
}

impl FlowParams {
    /// Read a single parameter.
    pub fn get(&self, id: ParamId) -> ParamValue {
        match id {
            ParamId::MinFlow => ParamValue::Float(self.min_flow),
            ParamId::MaxFlow => ParamValue::Float(self.max_flow),
            ParamId::ChangeInterval => ParamValue::Int(self.change_interval_micros),
        }
    }

    /// Whether the bounds form a usable range (`min <= max`, both finite).
    pub fn has_valid_range(&self) -> bool {
        self.min_flow.is_finite() && self.max_flow.is_finite() && self.min_flow <= self.max_flow
    }
}

/// Identifies one of the simulator parameters by its store name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParamId {
    /// `FFS_MIN_FLOW`, float.
    MinFlow,
    /// `FFS_MAX_FLOW`, float.
    MaxFlow,
    /// `FFS_CHANGE_INTERVAL`, integer microseconds.
    ChangeInterval,
}

impl ParamId {
    pub const ALL: [ParamId; 3] = [ParamId::MinFlow, ParamId::MaxFlow, ParamId::ChangeInterval];

    /// Name under which the parameter is exposed.
    pub const fn name(&self) -> &'static str {
        match self {
            ParamId::MinFlow => "FFS_MIN_FLOW",
            ParamId::MaxFlow => "FFS_MAX_FLOW",
            ParamId::ChangeInterval => "FFS_CHANGE_INTERVAL",
        }
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, ParamId::MinFlow | ParamId::MaxFlow)
    }

    /// Parse a textual value with this parameter's type.
    pub fn parse_value(&self, s: &str) -> Result<ParamValue, ParseParamError> {
        let s = s.trim();
        if self.is_float() {
            s.parse::<f32>()
                .map(ParamValue::Float)
                .map_err(|_| ParseParamError::InvalidValue(*self))
        } else {
            s.parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| ParseParamError::InvalidValue(*self))
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParamId {
    type Err = ParseParamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ParamId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(s))
            .ok_or(ParseParamError::UnknownName)
    }
}

/// A typed parameter value.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum ParamValue {
    Float(f32),
    Int(i64),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v:.4}"),
            ParamValue::Int(v) => write!(f, "{v}"),
        }
    }
}

/// Failure to interpret a parameter name or value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseParamError {
    /// No parameter has this name.
    UnknownName,
    /// The value does not parse as the parameter's type.
    InvalidValue(ParamId),
}

impl fmt::Display for ParseParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseParamError::UnknownName => f.write_str("unknown parameter"),
            ParseParamError::InvalidValue(id) if id.is_float() => {
                write!(f, "{id} expects a float value")
            }
            ParseParamError::InvalidValue(id) => write!(f, "{id} expects an integer value"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ParseParamError {}
