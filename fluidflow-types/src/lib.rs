//! # fluidflow-types
//!
//! Core types shared by the fluid-flow simulator and its consumers. This
//! crate defines the record published on the bus every tick, the three
//! tunable parameters that shape the simulation, and the monotonic time
//! representation both of them use.
//!
//! ## Features
//!
//! - `std` (default): Standard library support (`std::error::Error` impls)
//! - `serde`: JSON/TOML/etc. serialization via serde
//! - `minicbor`: Compact binary serialization via CBOR
//! - `all`: Enable all serialization formats
//!
//! ## Example
//!
//! ```rust
//! use fluidflow_types::{FlowParams, FlowSample, ParamId, Timestamp};
//!
//! let params = FlowParams::default();
//! assert_eq!(params.min_flow, 1.0);
//! assert_eq!(params.max_flow, 2.0);
//!
//! let sample = FlowSample::new(Timestamp::from_micros(100_000), 1.5);
//! assert!(sample.healthy);
//!
//! let id: ParamId = "FFS_CHANGE_INTERVAL".parse().unwrap();
//! assert_eq!(id, ParamId::ChangeInterval);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

mod params;
mod sample;
mod time;

pub use params::*;
pub use sample::*;
pub use time::*;
