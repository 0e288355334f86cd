//! Interrupt-driven pulse counter
//!
//! ## Concurrency
//!
//! The edge interrupt calls [`PulseCounter::record_pulse`] while the tick
//! loop collects and acknowledges. Both sides touch `count`, so every access
//! is atomic:
//!
//! ```text
//!   ISR:        count += 1                      (fetch_add)
//!   collect:    send_count = count              (snapshot)
//!   acked:      count -= send_count             (fetch_sub)
//!               send_count = 0
//! ```
//!
//! Subtracting the snapshot rather than zeroing means pulses that arrive
//! between collect and ack stay counted for the next uplink.
//!
//! The sensor interface is implemented on `&PulseCounter` so one `static`
//! counter can be shared between the interrupt handler and the node.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use crate::errors::{SensorError, SensorResult};
use crate::measurement::{MeasurementDefinition, MeasurementKind, Reading, ValueKind};
use crate::traits::SensorInterface;

/// Lead time the counter asks for before collect (milliseconds).
pub const PULSECOUNT_COLLECTION_TIME_MS: u32 = 10;

/// Pulse counter shared with an edge interrupt
#[derive(Debug, Default)]
pub struct PulseCounter {
    count: AtomicU32,
    send_count: AtomicU32,
    enabled: AtomicBool,
}

impl PulseCounter {
    /// Disabled counter at zero
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
            send_count: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
        }
    }

    /// Count one edge. Safe to call from interrupt context.
    #[inline]
    pub fn record_pulse(&self) {
        if self.enabled.load(Ordering::Relaxed) {
            self.count.fetch_add(1, Ordering::AcqRel);
        }
    }

    /// Pulses counted and not yet acknowledged
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Acquire)
    }

    /// Value reported by the last collect
    pub fn send_count(&self) -> u32 {
        self.send_count.load(Ordering::Acquire)
    }

    /// Counting is active
    pub fn is_counting(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    fn handles(def: &MeasurementDefinition) -> bool {
        def.kind == MeasurementKind::PulseCount
    }

    fn check(&self, def: &MeasurementDefinition) -> SensorResult<()> {
        if !Self::handles(def) {
            return Err(nb::Error::Other(SensorError::Failed { reason: "not a pulse counter" }));
        }
        if !self.is_counting() {
            return Err(nb::Error::Other(SensorError::Disabled));
        }
        Ok(())
    }
}

impl SensorInterface for &PulseCounter {
    fn value_kind(&self, def: &MeasurementDefinition) -> Option<ValueKind> {
        PulseCounter::handles(def).then_some(ValueKind::Integer)
    }

    fn collection_time(&mut self, _def: &MeasurementDefinition) -> Option<SensorResult<u32>> {
        Some(Ok(PULSECOUNT_COLLECTION_TIME_MS))
    }

    fn start(&mut self, def: &MeasurementDefinition, _isolated: bool) -> SensorResult<()> {
        self.check(def)?;
        meas_debug!("{} at start {}", def.name(), self.count());
        Ok(())
    }

    fn collect(&mut self, def: &MeasurementDefinition) -> SensorResult<Reading> {
        self.check(def)?;
        let snapshot = self.count.load(Ordering::Acquire);
        self.send_count.store(snapshot, Ordering::Release);
        meas_debug!("{} at end {}", def.name(), snapshot);
        Ok(Reading::Integer(snapshot as i64))
    }

    fn enable(&mut self, _def: &MeasurementDefinition, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
        if !enabled {
            self.count.store(0, Ordering::Release);
            self.send_count.store(0, Ordering::Release);
        }
    }

    fn is_enabled(&self, _def: &MeasurementDefinition) -> Option<bool> {
        Some(self.is_counting())
    }

    fn acked(&mut self, _def: &MeasurementDefinition) {
        let delivered = self.send_count.swap(0, Ordering::AcqRel);
        self.count.fetch_sub(delivered, Ordering::AcqRel);
    }
}
