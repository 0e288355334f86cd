//! One-shot synchronous reads
//!
//! Used by the instant-send path and by command handlers that need a value
//! right now. The read reuses the sensor's start/poll/collect sequence but
//! spins on [`Platform::tight_loop`] instead of returning to the tick loop,
//! bounded by the sensor's collection time (or a caller supplied timeout).
//!
//! A sensor that is powered down is enabled for the duration of the read
//! and disabled again afterwards. The periodic aggregate is not touched.

use crate::errors::{ConfigError, ReadError, SensorError};
use crate::measurement::Reading;
use crate::registry::{Entry, MeasurementRegistry};
use crate::time::{elapsed_ms, TimeSource};
use crate::traits::sensor::resolve_collection_time;
use crate::traits::{Platform, SensorInterface};

/// Call `step` until it yields a value or `timeout_ms` passes.
///
/// `step` always runs at least once.
fn iterate_for<R, H, T, F>(clock: &T, platform: &mut H, timeout_ms: u64, mut step: F) -> Option<R>
where
    H: Platform + ?Sized,
    T: TimeSource + ?Sized,
    F: FnMut() -> Option<R>,
{
    let started = clock.now();
    loop {
        if let Some(r) = step() {
            return Some(r);
        }
        if elapsed_ms(started, clock.now()) >= timeout_ms {
            return None;
        }
        platform.tight_loop();
    }
}

/// Read a measurement by name.
pub fn read_measurement<S, H, T, const N: usize>(
    registry: &mut MeasurementRegistry<N>,
    name: &str,
    sensors: &mut S,
    platform: &mut H,
    clock: &T,
    timeout_ms: Option<u32>,
) -> Result<Reading, ReadError>
where
    S: SensorInterface + ?Sized,
    H: Platform + ?Sized,
    T: TimeSource + ?Sized,
{
    let default_ms = registry.default_collection_time_ms();
    let entry = registry.entry_mut(name).ok_or(ConfigError::UnknownMeasurement)?;
    read_entry(entry, sensors, platform, clock, default_ms, timeout_ms)
}

pub(crate) fn read_entry<S, H, T>(
    entry: &mut Entry,
    sensors: &mut S,
    platform: &mut H,
    clock: &T,
    default_collection_time_ms: u32,
    timeout_ms: Option<u32>,
) -> Result<Reading, ReadError>
where
    S: SensorInterface + ?Sized,
    H: Platform + ?Sized,
    T: TimeSource + ?Sized,
{
    if entry.acc.is_acquiring {
        meas_debug!("Measurement {} already being collected.", entry.def.name());
        return Err(SensorError::AlreadyCollecting.into());
    }

    let was_disabled = sensors.is_enabled(&entry.def) == Some(false);
    if was_disabled {
        sensors.enable(&entry.def, true);
    }

    let result = acquire(entry, sensors, platform, clock, default_collection_time_ms, timeout_ms);

    if was_disabled {
        sensors.enable(&entry.def, false);
    }
    entry.acc.is_acquiring = false;
    result
}

fn acquire<S, H, T>(
    entry: &mut Entry,
    sensors: &mut S,
    platform: &mut H,
    clock: &T,
    default_collection_time_ms: u32,
    timeout_ms: Option<u32>,
) -> Result<Reading, ReadError>
where
    S: SensorInterface + ?Sized,
    H: Platform + ?Sized,
    T: TimeSource + ?Sized,
{
    let def = &entry.def;
    match sensors.start(def, true) {
        Ok(()) => {}
        Err(nb::Error::WouldBlock) => {
            meas_debug!("Could not begin {}, sensor busy.", def.name());
            return Err(SensorError::Failed { reason: "busy at start" }.into());
        }
        Err(nb::Error::Other(e)) => {
            meas_debug!("Could not begin {}.", def.name());
            return Err(e.into());
        }
    }

    let collection_time = resolve_collection_time(sensors, def, default_collection_time_ms);
    entry.acc.collection_time_estimate = collection_time;
    entry.acc.is_acquiring = true;
    let budget = timeout_ms.unwrap_or(collection_time) as u64;

    let began = clock.now();
    let polled = iterate_for(clock, platform, budget, || match sensors.poll(def) {
        Ok(()) => Some(Ok(())),
        Err(nb::Error::WouldBlock) => None,
        Err(nb::Error::Other(e)) => Some(Err(e)),
    });
    match polled {
        Some(Ok(())) => {}
        Some(Err(e)) => {
            meas_debug!("Failed on poll of {}.", def.name());
            return Err(e.into());
        }
        None => {
            meas_debug!("Timed out polling {}.", def.name());
            return Err(ReadError::TimedOut);
        }
    }

    let remaining = budget.saturating_sub(elapsed_ms(began, clock.now()));
    let collected = iterate_for(clock, platform, remaining, || match sensors.collect(def) {
        Ok(r) => Some(Ok(r)),
        Err(nb::Error::WouldBlock) => None,
        Err(nb::Error::Other(e)) => Some(Err(e)),
    });
    meas_debug!("Read of {} took {}ms", def.name(), elapsed_ms(began, clock.now()));

    match collected {
        Some(Ok(reading)) => Ok(reading),
        Some(Err(e)) => Err(e.into()),
        None => {
            meas_debug!("Collect is timed out...");
            Err(ReadError::TimedOut)
        }
    }
}
