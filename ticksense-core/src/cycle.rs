//! Transmit cycle clock
//!
//! Tracks when the last transmit tick started and how many ticks have
//! elapsed. The scheduler folds "now" into each measurement's period using
//! both values; the pipeline moves `last_sent` forward when it starts a
//! send.

use crate::time::{elapsed_ms, Timestamp};

/// Transmit tick bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransmitCycle {
    interval_ms: u32,
    last_sent: Timestamp,
    count: u32,
}

impl TransmitCycle {
    /// Start a cycle clock at `now`.
    pub const fn new(interval_ms: u32, now: Timestamp) -> Self {
        Self { interval_ms, last_sent: now, count: 0 }
    }

    /// Transmit tick length (milliseconds)
    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Change the tick length. Takes effect from the current tick.
    pub fn set_interval_ms(&mut self, interval_ms: u32) {
        self.interval_ms = interval_ms;
    }

    /// Start of the current tick
    pub fn last_sent(&self) -> Timestamp {
        self.last_sent
    }

    /// Ticks elapsed since boot, wrapping
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Time since the current tick started.
    #[inline]
    pub fn elapsed(&self, now: Timestamp) -> u64 {
        elapsed_ms(self.last_sent, now)
    }

    /// The current tick is over.
    #[inline]
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.elapsed(now) > self.interval_ms as u64
    }

    /// Count one more tick.
    pub fn advance(&mut self) -> u32 {
        self.count = self.count.wrapping_add(1);
        self.count
    }

    /// Mark a new tick as started at `now`.
    pub fn restart(&mut self, now: Timestamp) {
        self.last_sent = now;
    }

    /// Time left in the current tick, zero once it is over.
    pub fn time_to_next(&self, now: Timestamp) -> u64 {
        (self.interval_ms as u64).saturating_sub(self.elapsed(now))
    }

    #[cfg(test)]
    pub(crate) fn set_count(&mut self, count: u32) {
        self.count = count;
    }
}
