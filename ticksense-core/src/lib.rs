//! Measurement scheduling and uplink core for TickSense
//!
//! Decides when each configured measurement is sampled, folds samples into
//! per-period aggregates, and packs due aggregates into uplink frames.
//! Designed for battery-powered sensor nodes with a slow radio link.
//!
//! Key constraints:
//! - Runs from a single cooperative tick loop, nothing blocks
//! - No heap allocation; tables are fixed-size
//! - The radio may only carry part of a cycle per frame
//!
//! ```rust
//! use ticksense_core::{MeasurementDefinition, MeasurementKind, NodeConfig};
//!
//! let config = NodeConfig::new().with_transmit_interval_ms(5 * 60_000);
//! assert!(config.validate().is_ok());
//!
//! // Two samples of the temperature probe per 5 minute tick
//! let def = MeasurementDefinition::new("TMP", MeasurementKind::W1Probe, 1, 2).unwrap();
//! assert!(def.is_active());
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

#[macro_use]
mod logging;

pub mod accumulator;
pub mod config;
pub mod constants;
pub mod cycle;
pub mod errors;
pub mod instant;
pub mod measurement;
pub mod node;
pub mod pipeline;
pub mod reading;
pub mod registry;
pub mod scheduler;
pub mod sensors;
pub mod sleep;
pub mod time;
pub mod traits;

// Public API
pub use accumulator::{Aggregate, MeasurementAccumulator};
pub use config::{NodeConfig, PowerMode};
pub use cycle::TransmitCycle;
pub use errors::{ConfigError, ProtocolError, ReadError, SendError, SensorError};
pub use measurement::{MeasurementDefinition, MeasurementKind, Reading, ValueKind};
pub use node::{Iteration, SensorNode};
pub use pipeline::{SendOutcome, TransmissionPipeline};
pub use registry::{BootSource, MeasurementRegistry};
pub use scheduler::Scheduler;
pub use sleep::{SleepDecision, SleepGovernor};
pub use traits::{Platform, Protocol, SensorInterface, TimeSource};

/// Everything needed to wire up a node
pub mod prelude {
    pub use crate::accumulator::{Aggregate, MeasurementAccumulator};
    pub use crate::config::{NodeConfig, PowerMode};
    pub use crate::errors::{
        ConfigError, ConfigResult, ProtocolError, ProtocolResult, ReadError, SendError, SensorError,
        SensorResult,
    };
    pub use crate::measurement::{MeasurementDefinition, MeasurementKind, Reading, ValueKind};
    pub use crate::node::{Iteration, SensorNode};
    pub use crate::pipeline::SendOutcome;
    pub use crate::sensors::PulseCounter;
    pub use crate::sleep::SleepDecision;
    #[cfg(feature = "std")]
    pub use crate::time::MonotonicTime;
    pub use crate::time::{FixedTime, TimeSource, Timestamp};
    pub use crate::traits::{Platform, Protocol, SensorInterface};
}

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
