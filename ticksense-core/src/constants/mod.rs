//! Constants for TickSense Core
//!
//! Centralised, documented constants used by the scheduler, the uplink
//! pipeline and the sleep governor. Runtime-tunable values have a default
//! here and an override in [`crate::config::NodeConfig`].
//!
//! ## Organization
//!
//! - **Time**: transmit intervals, guard bands and sleep thresholds
//! - **Buffers**: table capacity and inline string sizes
//!
//! ## Usage Guidelines
//!
//! 1. Always use these constants instead of magic numbers
//! 2. Use descriptive names that include units

/// Time-related constants for intervals, guard bands and timeouts.
pub mod time;

/// Table capacities and inline string lengths.
pub mod buffers;

pub use time::{
    DEFAULT_TRANSMIT_INTERVAL_MS, MIN_TRANSMIT_INTERVAL_MS,
    DEFAULT_COLLECTION_TIME_MS, IMMEDIATE_GUARD_MS,
    MIN_SLEEP_MS, INSTANT_SEND_GUARD_MS,
};

pub use buffers::{MAX_MEASUREMENTS, MEASURE_NAME_LEN, VALUE_STR_LEN};
