//! Sensor acquisition interface
//!
//! ## Acquisition Model
//!
//! ```text
//!   start(def) ──► poll(def) ─┬─► collect(def)
//!                    ▲        │
//!                    └─ busy ─┘
//! ```
//!
//! Each call returns an [`nb::Result`]: `Ok` is success, `WouldBlock` means
//! the sensor is busy and the call should be retried on a later tick, and
//! `Other(e)` is a failed acquisition. Nothing here may block.

use crate::errors::SensorResult;
use crate::measurement::{MeasurementDefinition, Reading, ValueKind};

/// Acquisition calls dispatched by measurement definition
pub trait SensorInterface {
    /// Value type produced for this definition, `None` if the kind has no
    /// driver.
    fn value_kind(&self, def: &MeasurementDefinition) -> Option<ValueKind>;

    /// Time from `start` until `collect` can succeed (milliseconds).
    ///
    /// `None` means the sensor needs no lead time. A busy or failed query
    /// falls back to the configured default collection time.
    fn collection_time(&mut self, _def: &MeasurementDefinition) -> Option<SensorResult<u32>> {
        None
    }

    /// Begin an acquisition. `isolated` is set for one-shot reads outside
    /// the periodic schedule.
    fn start(&mut self, _def: &MeasurementDefinition, _isolated: bool) -> SensorResult<()> {
        Ok(())
    }

    /// Let an in-flight acquisition make progress.
    fn poll(&mut self, _def: &MeasurementDefinition) -> SensorResult<()> {
        Ok(())
    }

    /// Finish the acquisition and return the value.
    fn collect(&mut self, def: &MeasurementDefinition) -> SensorResult<Reading>;

    /// Power the sensor up or down.
    fn enable(&mut self, _def: &MeasurementDefinition, _enabled: bool) {}

    /// Whether the sensor is powered, `None` if it has no power control.
    fn is_enabled(&self, _def: &MeasurementDefinition) -> Option<bool> {
        None
    }

    /// The last collected value was delivered.
    fn acked(&mut self, _def: &MeasurementDefinition) {}
}

impl<S: SensorInterface + ?Sized> SensorInterface for &mut S {
    fn value_kind(&self, def: &MeasurementDefinition) -> Option<ValueKind> {
        (**self).value_kind(def)
    }

    fn collection_time(&mut self, def: &MeasurementDefinition) -> Option<SensorResult<u32>> {
        (**self).collection_time(def)
    }

    fn start(&mut self, def: &MeasurementDefinition, isolated: bool) -> SensorResult<()> {
        (**self).start(def, isolated)
    }

    fn poll(&mut self, def: &MeasurementDefinition) -> SensorResult<()> {
        (**self).poll(def)
    }

    fn collect(&mut self, def: &MeasurementDefinition) -> SensorResult<Reading> {
        (**self).collect(def)
    }

    fn enable(&mut self, def: &MeasurementDefinition, enabled: bool) {
        (**self).enable(def, enabled)
    }

    fn is_enabled(&self, def: &MeasurementDefinition) -> Option<bool> {
        (**self).is_enabled(def)
    }

    fn acked(&mut self, def: &MeasurementDefinition) {
        (**self).acked(def)
    }
}

/// Resolve the collection time estimate for a definition.
pub(crate) fn resolve_collection_time<S: SensorInterface + ?Sized>(
    sensors: &mut S,
    def: &MeasurementDefinition,
    default_ms: u32,
) -> u32 {
    match sensors.collection_time(def) {
        None => 0,
        Some(Ok(ms)) => ms,
        Some(Err(nb::Error::WouldBlock)) => {
            meas_debug!("{} busy reporting collection time, using default", def.name());
            default_ms
        }
        Some(Err(nb::Error::Other(_e))) => {
            meas_debug!("{} failed to report collection time: {}, using default", def.name(), _e);
            default_ms
        }
    }
}
