//! Collaborator Traits
//!
//! The tick loop never touches hardware directly. Everything outside the
//! scheduling core is reached through three traits:
//!
//! - [`sensor`] - [`SensorInterface`], one object dispatching acquisition
//!   calls by measurement definition
//! - [`protocol`] - [`Protocol`], the uplink buffer and radio
//! - [`platform`] - [`Platform`], battery probe and sleep
//!
//! Time comes from [`TimeSource`], re-exported here for convenience.
//!
//! ## Optional Capabilities
//!
//! Most sensors only need `collect`. Every other capability has a default
//! that matches a sensor without that feature, so a driver implements only
//! what its hardware needs:
//!
//! ```rust
//! use ticksense_core::traits::SensorInterface;
//! use ticksense_core::measurement::{MeasurementDefinition, Reading, ValueKind};
//! use ticksense_core::errors::SensorResult;
//!
//! struct FixedValue(i64);
//!
//! impl SensorInterface for FixedValue {
//!     fn value_kind(&self, _def: &MeasurementDefinition) -> Option<ValueKind> {
//!         Some(ValueKind::Integer)
//!     }
//!
//!     fn collect(&mut self, _def: &MeasurementDefinition) -> SensorResult<Reading> {
//!         Ok(Reading::Integer(self.0))
//!     }
//! }
//! ```

pub mod platform;
pub mod protocol;
pub mod sensor;

pub use platform::Platform;
pub use protocol::Protocol;
pub use sensor::SensorInterface;

pub use crate::time::TimeSource;
