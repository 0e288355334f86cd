//! Transmission Pipeline
//!
//! ## Overview
//!
//! When a transmit tick ends the pipeline walks the registry in slot order,
//! appending every measurement due this cycle to the protocol's frame. A
//! frame that fills up is sent as a **fragment** and the walk resumes from
//! the failing slot on the next invocation:
//!
//! ```text
//!   slots:    0    1    2    3    4
//!   due:      x    x    x    x    x
//!   send #1: [0    1]                    append(2) failed, cursor = 2
//!   send #2:           [2    3    4]     cursor = end, cycle complete
//! ```
//!
//! Each measurement's accumulator is zeroed and marked `pending_ack` the
//! moment it is appended, so a later resend can never count it twice.
//!
//! ## Link States
//!
//! ```text
//!   not connected ─────────────► drop cursors, nothing sent
//!   connected, not ready ──┬──► send not allowed: defer
//!                          ├──► first attempt: mark pending
//!                          └──► pending > T/4: reset everything
//!   connected, ready ──────────► build and send
//! ```
//!
//! ## Acknowledgement
//!
//! A positive ack walks the window `[prev_cursor, cursor)` that the last
//! frame covered and calls the sensor's `acked` hook for each measurement
//! in it, then continues with the next fragment if one is queued. A
//! negative ack resets the cursors; already-cleared accumulators are not
//! replayed.

use crate::constants::buffers::MAX_MEASUREMENTS;
use crate::constants::time::PENDING_SEND_TIMEOUT_DIVISOR;
use crate::cycle::TransmitCycle;
use crate::registry::MeasurementRegistry;
use crate::time::Timestamp;
use crate::traits::{Protocol, SensorInterface};

/// Pipeline counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineStats {
    /// Frames that completed a transmit cycle
    pub complete_sends: u32,
    /// Frames that left part of a cycle for later
    pub fragments: u32,
    /// Due measurements skipped because nothing was sampled
    pub skipped_unsampled: u32,
    /// Pending sends dropped after waiting too long
    pub pending_timeouts: u32,
    /// Positive acknowledgements
    pub acks: u32,
    /// Negative acknowledgements
    pub nacks: u32,
    /// Cycles dropped because the link was down
    pub dropped_disconnected: u32,
}

impl PipelineStats {
    /// All counters zero
    pub const fn new() -> Self {
        Self {
            complete_sends: 0,
            fragments: 0,
            skipped_unsampled: 0,
            pending_timeouts: 0,
            acks: 0,
            nacks: 0,
            dropped_disconnected: 0,
        }
    }
}

/// What one pipeline invocation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// No link; cursors dropped
    NotConnected,
    /// Sending is not allowed right now
    Deferred,
    /// Radio not ready; waiting for it
    Pending,
    /// Waited too long for the radio; state reset
    TimedOut,
    /// The protocol could not open a frame
    InitFailed,
    /// Nothing was due or nothing fitted
    NothingQueued,
    /// Part of the cycle was sent; more follows
    Fragment {
        /// Measurements in this frame
        queued: u16,
    },
    /// The rest of the cycle was sent
    Complete {
        /// Measurements in this frame
        queued: u16,
    },
    /// The protocol rejected the frame; state reset
    SendFailed,
}

/// Batches due measurements into uplink frames
#[derive(Debug, Clone)]
pub struct TransmissionPipeline<const N: usize = MAX_MEASUREMENTS> {
    cursor: usize,
    prev_cursor: usize,
    pending_send: bool,
    disconnected: bool,
    stats: PipelineStats,
}

impl<const N: usize> TransmissionPipeline<N> {
    /// Idle pipeline
    pub const fn new() -> Self {
        Self {
            cursor: 0,
            prev_cursor: 0,
            pending_send: false,
            disconnected: false,
            stats: PipelineStats::new(),
        }
    }

    /// Slot the next frame starts at; `N` once the cycle is complete
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Slot the last frame started at
    pub fn prev_cursor(&self) -> usize {
        self.prev_cursor
    }

    /// A send is waiting for the radio or for the next fragment
    pub fn is_pending(&self) -> bool {
        self.pending_send
    }

    /// Part of a cycle has been sent and the rest has not
    pub fn is_mid_fragment(&self) -> bool {
        self.cursor != 0 && self.cursor != N
    }

    /// Counters
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Forget where the current cycle had got to.
    pub fn reset_cursors(&mut self) {
        self.cursor = 0;
        self.prev_cursor = 0;
        self.pending_send = false;
    }

    /// Send what is due this cycle, or resume a fragmented cycle.
    pub fn maybe_send<P, const M: usize>(
        &mut self,
        registry: &mut MeasurementRegistry<M>,
        protocol: &mut P,
        cycle: &mut TransmitCycle,
        now: Timestamp,
    ) -> SendOutcome
    where
        P: Protocol + ?Sized,
    {
        if !protocol.is_connected() {
            if !self.disconnected {
                meas_debug!("Not connected to send, dropping readings");
                self.disconnected = true;
                self.cursor = 0;
                self.prev_cursor = 0;
                self.stats.dropped_disconnected = self.stats.dropped_disconnected.wrapping_add(1);
            }
            self.pending_send = false;
            return SendOutcome::NotConnected;
        }
        self.disconnected = false;

        if !protocol.send_ready() {
            if !protocol.send_allowed() {
                meas_debug!("Send not allowed, deferring");
                return SendOutcome::Deferred;
            }
            if self.pending_send {
                let timeout = (cycle.interval_ms() / PENDING_SEND_TIMEOUT_DIVISOR) as u64;
                if cycle.elapsed(now) > timeout {
                    meas_warn!("Pending send timed out.");
                    self.stats.pending_timeouts = self.stats.pending_timeouts.wrapping_add(1);
                    self.reset_send(registry, protocol);
                    return SendOutcome::TimedOut;
                }
                return SendOutcome::Pending;
            }
            cycle.restart(now);
            self.pending_send = true;
            return SendOutcome::Pending;
        }

        if protocol.init().is_err() {
            meas_debug!("Could not open an uplink frame.");
            self.pending_send = false;
            cycle.restart(now);
            return SendOutcome::InitFailed;
        }

        if self.cursor >= N {
            self.cursor = 0;
        }
        let start = self.cursor;
        if start != 0 {
            meas_debug!("Resuming previous measurements send.");
        }

        let count = cycle.count();
        let mut queued: u16 = 0;
        let mut stopped_at = None;
        for index in start..N.min(M) {
            let Some(entry) = registry.slot_mut(index) else {
                continue;
            };
            if !entry.def.is_due(count) {
                continue;
            }
            if entry.acc.samples_taken == 0 {
                meas_error!("Measurement {} requested but value not set.", entry.def.name());
                entry.acc.reset_counters();
                self.stats.skipped_unsampled = self.stats.skipped_unsampled.wrapping_add(1);
                continue;
            }
            if protocol.append(&entry.def, &entry.acc).is_err() {
                meas_debug!("Failed to queue send of {}.", entry.def.name());
                stopped_at = Some(index);
                break;
            }
            entry.acc.reset();
            entry.acc.pending_ack = true;
            queued = queued.saturating_add(1);
        }

        self.prev_cursor = start;
        let complete = match stopped_at {
            Some(index) => {
                self.cursor = index;
                false
            }
            None => {
                self.cursor = N;
                true
            }
        };

        if !self.pending_send {
            cycle.restart(now);
        }
        if queued == 0 {
            return SendOutcome::NothingQueued;
        }

        self.pending_send = !complete;
        if protocol.send().is_err() {
            meas_debug!("Protocol send failed, resetting protocol");
            self.reset_send(registry, protocol);
            return SendOutcome::SendFailed;
        }
        if complete {
            meas_debug!("Complete send");
            self.stats.complete_sends = self.stats.complete_sends.wrapping_add(1);
            SendOutcome::Complete { queued }
        } else {
            meas_debug!("Fragment send, wait to send more.");
            self.stats.fragments = self.stats.fragments.wrapping_add(1);
            SendOutcome::Fragment { queued }
        }
    }

    /// Handle the protocol's acknowledgement of the last frame.
    ///
    /// Returns the outcome of the follow-up send when another fragment was
    /// waiting.
    pub fn on_ack<S, P, const M: usize>(
        &mut self,
        success: bool,
        registry: &mut MeasurementRegistry<M>,
        sensors: &mut S,
        protocol: &mut P,
        cycle: &mut TransmitCycle,
        now: Timestamp,
    ) -> Option<SendOutcome>
    where
        S: SensorInterface + ?Sized,
        P: Protocol + ?Sized,
    {
        if !success {
            meas_debug!("Send not acknowledged, dropping cycle state");
            self.stats.nacks = self.stats.nacks.wrapping_add(1);
            self.reset_cursors();
            clear_pending_ack(registry);
            return None;
        }
        self.stats.acks = self.stats.acks.wrapping_add(1);

        let end = if self.cursor != 0 { self.cursor } else { N };
        let count = cycle.count();
        for index in self.prev_cursor..end.min(M) {
            let Some(entry) = registry.slot_mut(index) else {
                continue;
            };
            if !entry.def.is_due(count) || !entry.acc.pending_ack {
                continue;
            }
            sensors.acked(&entry.def);
            entry.acc.pending_ack = false;
        }

        if self.pending_send {
            Some(self.maybe_send(registry, protocol, cycle, now))
        } else {
            self.cursor = 0;
            self.prev_cursor = 0;
            None
        }
    }

    /// Drop the frame, the cursors and every pending acknowledgement.
    fn reset_send<P, const M: usize>(&mut self, registry: &mut MeasurementRegistry<M>, protocol: &mut P)
    where
        P: Protocol + ?Sized,
    {
        meas_debug!("Protocol reset");
        protocol.reset();
        self.reset_cursors();
        clear_pending_ack(registry);
    }
}

impl<const N: usize> Default for TransmissionPipeline<N> {
    fn default() -> Self {
        Self::new()
    }
}

fn clear_pending_ack<const M: usize>(registry: &mut MeasurementRegistry<M>) {
    for entry in registry.entries_mut() {
        entry.acc.pending_ack = false;
    }
}
