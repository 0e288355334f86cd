//! Time management for the tick loop
//!
//! Everything in TickSense measures time as milliseconds from a monotonic
//! counter. Elapsed times are always computed with saturating subtraction
//! so a counter that briefly reads behind a stored timestamp yields zero
//! rather than a huge wrapped delta.

use core::cell::Cell;

/// Milliseconds since device boot
pub type Timestamp = u64;

/// Source of time for the node
pub trait TimeSource {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;

    /// Check if this source provides wall clock time (vs monotonic)
    fn is_wall_clock(&self) -> bool {
        false
    }
}

impl<T: TimeSource + ?Sized> TimeSource for &T {
    fn now(&self) -> Timestamp {
        (**self).now()
    }

    fn is_wall_clock(&self) -> bool {
        (**self).is_wall_clock()
    }
}

/// Milliseconds from `earlier` to `later`, zero if `later` is behind.
#[inline]
pub fn elapsed_ms(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier)
}

/// Monotonic time source backed by [`std::time::Instant`]
///
/// Starts at 0 when constructed.
#[cfg(feature = "std")]
#[derive(Debug, Clone)]
pub struct MonotonicTime {
    start: std::time::Instant,
}

#[cfg(feature = "std")]
impl MonotonicTime {
    /// Start counting from now.
    pub fn new() -> Self {
        Self { start: std::time::Instant::now() }
    }
}

#[cfg(feature = "std")]
impl Default for MonotonicTime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl TimeSource for MonotonicTime {
    fn now(&self) -> Timestamp {
        self.start.elapsed().as_millis() as Timestamp
    }
}

/// Manually driven time source for tests and simulation
///
/// Uses interior mutability so a shared reference can be handed to the
/// node while the test keeps advancing the clock.
#[derive(Debug, Clone, Default)]
pub struct FixedTime {
    timestamp: Cell<Timestamp>,
}

impl FixedTime {
    /// Create a clock stopped at `timestamp`.
    pub const fn new(timestamp: Timestamp) -> Self {
        Self { timestamp: Cell::new(timestamp) }
    }

    /// Jump to an absolute time.
    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.set(timestamp);
    }

    /// Move the clock forward.
    pub fn advance(&self, ms: u64) {
        self.timestamp.set(self.timestamp.get().saturating_add(ms));
    }
}

impl TimeSource for FixedTime {
    fn now(&self) -> Timestamp {
        self.timestamp.get()
    }
}
