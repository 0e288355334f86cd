//! Time-Related Constants
//!
//! Intervals, guard bands and thresholds used by the tick loop. All values
//! are in milliseconds unless the name says otherwise.

// ===== TIME UNIT CONVERSIONS =====

/// Milliseconds per second.
pub const MS_PER_SECOND: u32 = 1000;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: u32 = 60;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: u32 = MS_PER_SECOND * SECONDS_PER_MINUTE;

// ===== TRANSMIT CYCLE =====

/// Default transmit interval (milliseconds).
///
/// 15 minutes keeps a LoRaWAN class A node well inside fair-use airtime
/// while still giving useful resolution for slow environmental signals.
pub const DEFAULT_TRANSMIT_INTERVAL_MS: u32 = 15 * MS_PER_MINUTE;

/// Shortest accepted transmit interval (milliseconds).
///
/// Also the window before a scheduled uplink during which instant sends
/// are refused.
pub const MIN_TRANSMIT_INTERVAL_MS: u32 = 15 * MS_PER_SECOND;

/// Divisor applied to the transmit interval to get the pending-send timeout.
///
/// A send that is not ready within a quarter of the interval is dropped.
pub const PENDING_SEND_TIMEOUT_DIVISOR: u32 = 4;

// ===== ACQUISITION =====

/// Collection time assumed when a sensor cannot report its own (milliseconds).
pub const DEFAULT_COLLECTION_TIME_MS: u32 = 1000;

/// Guard band before the period end for immediate measurements (milliseconds).
///
/// An immediate measurement with a single sample is taken this long before
/// its period closes so the value is as fresh as possible when sent.
pub const IMMEDIATE_GUARD_MS: u32 = 10;

/// Multiplier (in tenths) applied to a collection time to derive a
/// synchronous read timeout.
pub const READ_TIMEOUT_TENTHS: u32 = 15;

// ===== POWER =====

/// Minimum nap worth entering sleep for (milliseconds).
///
/// Also used as the wake-up margin subtracted from every nap.
pub const MIN_SLEEP_MS: u32 = 1000;

/// Time that must remain before the next scheduled uplink for an instant
/// send to be transmitted (milliseconds).
pub const INSTANT_SEND_GUARD_MS: u32 = MIN_TRANSMIT_INTERVAL_MS;
