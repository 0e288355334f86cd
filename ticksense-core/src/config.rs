//! Node configuration
//!
//! Runtime-tunable timing for the tick loop. Every field has a default in
//! [`crate::constants`]; deployments usually only change the transmit
//! interval and the power mode.
//!
//! ```rust
//! use ticksense_core::config::{NodeConfig, PowerMode};
//!
//! let config = NodeConfig::new()
//!     .with_transmit_interval_ms(60_000)
//!     .with_power_mode(PowerMode::Battery);
//!
//! assert!(config.validate().is_ok());
//! ```

use crate::constants::time::{
    DEFAULT_COLLECTION_TIME_MS, DEFAULT_TRANSMIT_INTERVAL_MS, IMMEDIATE_GUARD_MS,
    INSTANT_SEND_GUARD_MS, MIN_SLEEP_MS, MIN_TRANSMIT_INTERVAL_MS, MS_PER_MINUTE,
};
use crate::errors::{ConfigError, ConfigResult};

/// Sleep policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PowerMode {
    /// Sleep only while the battery probe reports battery power
    #[default]
    Auto,
    /// Always allowed to sleep
    Battery,
    /// Never sleep
    Plugged,
}

#[cfg(feature = "defmt")]
impl defmt::Format for PowerMode {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Auto => defmt::write!(fmt, "auto"),
            Self::Battery => defmt::write!(fmt, "battery"),
            Self::Plugged => defmt::write!(fmt, "plugged"),
        }
    }
}

/// Timing configuration for a sensor node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NodeConfig {
    /// Length of one transmit tick
    pub transmit_interval_ms: u32,
    /// Lead before the period end for immediate single-sample measurements
    pub immediate_guard_ms: u32,
    /// Collection time used when a sensor cannot report one
    pub default_collection_time_ms: u32,
    /// Shortest nap worth taking, also subtracted from every nap
    pub min_sleep_ms: u32,
    /// Time that must remain before the next scheduled send for an
    /// instant send to go out
    pub instant_send_guard_ms: u32,
    /// Sleep policy
    pub power_mode: PowerMode,
}

impl NodeConfig {
    /// Configuration with every default applied.
    pub const fn new() -> Self {
        Self {
            transmit_interval_ms: DEFAULT_TRANSMIT_INTERVAL_MS,
            immediate_guard_ms: IMMEDIATE_GUARD_MS,
            default_collection_time_ms: DEFAULT_COLLECTION_TIME_MS,
            min_sleep_ms: MIN_SLEEP_MS,
            instant_send_guard_ms: INSTANT_SEND_GUARD_MS,
            power_mode: PowerMode::Auto,
        }
    }

    /// Build from an interval stored as thousandths of a minute.
    ///
    /// Persisted configuration keeps the interval in this unit so that
    /// fractional minutes survive a round trip (`1500` is 90 seconds).
    pub fn from_interval_mins_milli(mins_milli: u32) -> Self {
        let interval_ms = (mins_milli as u64 * MS_PER_MINUTE as u64 / 1000)
            .min(u32::MAX as u64) as u32;
        Self::new().with_transmit_interval_ms(interval_ms)
    }

    /// Transmit interval as thousandths of a minute.
    pub fn interval_mins_milli(&self) -> u32 {
        (self.transmit_interval_ms as u64 * 1000 / MS_PER_MINUTE as u64) as u32
    }

    /// Set the transmit interval
    pub fn with_transmit_interval_ms(mut self, ms: u32) -> Self {
        self.transmit_interval_ms = ms;
        self
    }

    /// Set the immediate guard band
    pub fn with_immediate_guard_ms(mut self, ms: u32) -> Self {
        self.immediate_guard_ms = ms;
        self
    }

    /// Set the fallback collection time
    pub fn with_default_collection_time_ms(mut self, ms: u32) -> Self {
        self.default_collection_time_ms = ms;
        self
    }

    /// Set the minimum sleep
    pub fn with_min_sleep_ms(mut self, ms: u32) -> Self {
        self.min_sleep_ms = ms;
        self
    }

    /// Set the instant send guard window
    pub fn with_instant_send_guard_ms(mut self, ms: u32) -> Self {
        self.instant_send_guard_ms = ms;
        self
    }

    /// Set the power mode
    pub fn with_power_mode(mut self, mode: PowerMode) -> Self {
        self.power_mode = mode;
        self
    }

    /// Check the configuration is usable.
    ///
    /// The interval must be at least [`MIN_TRANSMIT_INTERVAL_MS`] and the
    /// guard band must be shorter than the interval.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.transmit_interval_ms < MIN_TRANSMIT_INTERVAL_MS {
            return Err(ConfigError::InvalidInterval {
                interval_ms: self.transmit_interval_ms,
                min_ms: MIN_TRANSMIT_INTERVAL_MS,
            });
        }
        if self.immediate_guard_ms >= self.transmit_interval_ms {
            return Err(ConfigError::InvalidInterval {
                interval_ms: self.transmit_interval_ms,
                min_ms: self.immediate_guard_ms.saturating_add(1),
            });
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new()
    }
}
