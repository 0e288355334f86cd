//! Error Types for Scheduling, Acquisition and Uplink
//!
//! ## Design Philosophy
//!
//! Errors follow the same rules as every other hot-path type in TickSense:
//!
//! 1. **No Heap Allocation**: payloads are integers or `&'static str`.
//! 2. **Copy Semantics**: every error is `Copy` so it can be returned from
//!    the tick loop and stored in stats without moves.
//! 3. **Busy is not an error**: a sensor that is still working reports
//!    `nb::Error::WouldBlock`, never a variant of [`SensorError`].
//!
//! ## Error Categories
//!
//! ### Configuration
//! - [`ConfigError`]: rejected registry edits and invalid node settings
//!
//! ### Acquisition
//! - [`SensorError`]: a driver failed to start, poll or collect
//! - [`ReadError`]: a synchronous read did not produce a value
//!
//! ### Uplink
//! - [`ProtocolError`]: the radio layer refused an operation
//! - [`SendError`]: a send request was refused before reaching the radio
//!
//! ## Busy Handling
//!
//! ```rust
//! use ticksense_core::errors::{SensorError, SensorResult};
//!
//! fn poll_once(r: SensorResult<u32>) -> &'static str {
//!     match r {
//!         Ok(_) => "done",
//!         Err(nb::Error::WouldBlock) => "busy, try again later",
//!         Err(nb::Error::Other(SensorError::Timeout)) => "timed out",
//!         Err(nb::Error::Other(_)) => "failed",
//!     }
//! }
//!
//! assert_eq!(poll_once(Err(nb::Error::WouldBlock)), "busy, try again later");
//! ```

use thiserror_no_std::Error;

/// Result of a driver call: `Ok`, busy (`WouldBlock`) or failed.
pub type SensorResult<T> = nb::Result<T, SensorError>;

/// Result of a registry edit or configuration change.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result of a radio protocol call.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Rejected registry edits and invalid node configuration.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A measurement with this name already exists
    #[error("Measurement name already in use")]
    DuplicateName,

    /// Name is empty or longer than the inline name buffer
    #[error("Invalid measurement name")]
    InvalidName,

    /// Every slot in the table is occupied
    #[error("Measurement table is full")]
    TableFull,

    /// No measurement with this name exists
    #[error("Unknown measurement")]
    UnknownMeasurement,

    /// Sample count of zero
    #[error("Sample count must be at least 1")]
    InvalidSampleCount,

    /// The sensor driver does not know the measurement kind
    #[error("Sensor kind has no driver")]
    UnsupportedKind,

    /// Transmit interval below the allowed minimum
    #[error("Transmit interval {interval_ms}ms below minimum {min_ms}ms")]
    InvalidInterval {
        /// Requested interval
        interval_ms: u32,
        /// Smallest accepted interval
        min_ms: u32,
    },
}

/// Driver-level acquisition failures.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// Hardware or bus failure
    #[error("Sensor failed: {reason}")]
    Failed {
        /// Short static description from the driver
        reason: &'static str,
    },

    /// An acquisition is already in flight for this measurement
    #[error("Acquisition already in progress")]
    AlreadyCollecting,

    /// The acquisition did not complete in time
    #[error("Sensor timed out")]
    Timeout,

    /// The sensor is powered down
    #[error("Sensor disabled")]
    Disabled,
}

/// Failures reported by the radio protocol layer.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// Could not open a new uplink buffer
    #[error("Protocol init failed")]
    InitFailed,

    /// The uplink buffer has no room for another entry
    #[error("Uplink buffer full")]
    BufferFull,

    /// Transmission was rejected
    #[error("Send failed")]
    SendFailed,

    /// No network link
    #[error("Not connected")]
    NotConnected,
}

/// Why a synchronous read failed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    /// The measurement could not be used
    #[error("Read refused: {0}")]
    Config(ConfigError),

    /// The sensor reported a failure
    #[error("Read failed: {0}")]
    Sensor(SensorError),

    /// The sensor stayed busy past the read timeout
    #[error("Read timed out")]
    TimedOut,
}

impl From<ConfigError> for ReadError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<SensorError> for ReadError {
    fn from(err: SensorError) -> Self {
        Self::Sensor(err)
    }
}

/// Why an instant or test send was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// No network link
    #[error("Not connected")]
    NotConnected,

    /// The protocol cannot accept a send right now
    #[error("Protocol not ready")]
    NotReady,

    /// A fragmented scheduled send is still being transmitted
    #[error("Scheduled send underway")]
    FragmentInProgress,

    /// The next scheduled send is too close
    #[error("Scheduled send imminent")]
    ScheduledSendImminent,

    /// Nothing was appended to the uplink buffer
    #[error("Nothing queued")]
    NothingQueued,

    /// The protocol layer failed
    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),

    /// Reading the value to send failed
    #[error("Read error: {0}")]
    Read(ReadError),
}

impl From<ProtocolError> for SendError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err)
    }
}

impl From<ReadError> for SendError {
    fn from(err: ReadError) -> Self {
        Self::Read(err)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ConfigError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::DuplicateName => defmt::write!(fmt, "Duplicate name"),
            Self::InvalidName => defmt::write!(fmt, "Invalid name"),
            Self::TableFull => defmt::write!(fmt, "Table full"),
            Self::UnknownMeasurement => defmt::write!(fmt, "Unknown measurement"),
            Self::InvalidSampleCount => defmt::write!(fmt, "Invalid sample count"),
            Self::UnsupportedKind => defmt::write!(fmt, "Unsupported kind"),
            Self::InvalidInterval { interval_ms, min_ms } =>
                defmt::write!(fmt, "Interval {}ms < {}ms", interval_ms, min_ms),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SensorError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Failed { reason } => defmt::write!(fmt, "Sensor failed: {}", reason),
            Self::AlreadyCollecting => defmt::write!(fmt, "Already collecting"),
            Self::Timeout => defmt::write!(fmt, "Timeout"),
            Self::Disabled => defmt::write!(fmt, "Disabled"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ProtocolError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InitFailed => defmt::write!(fmt, "Init failed"),
            Self::BufferFull => defmt::write!(fmt, "Buffer full"),
            Self::SendFailed => defmt::write!(fmt, "Send failed"),
            Self::NotConnected => defmt::write!(fmt, "Not connected"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ReadError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::Config(e) => defmt::write!(fmt, "Read refused: {}", e),
            Self::Sensor(e) => defmt::write!(fmt, "Read failed: {}", e),
            Self::TimedOut => defmt::write!(fmt, "Read timed out"),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for SendError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::NotConnected => defmt::write!(fmt, "Not connected"),
            Self::NotReady => defmt::write!(fmt, "Not ready"),
            Self::FragmentInProgress => defmt::write!(fmt, "Send underway"),
            Self::ScheduledSendImminent => defmt::write!(fmt, "Send imminent"),
            Self::NothingQueued => defmt::write!(fmt, "Nothing queued"),
            Self::Protocol(e) => defmt::write!(fmt, "Protocol: {}", e),
            Self::Read(e) => defmt::write!(fmt, "Read: {}", e),
        }
    }
}
