//! Measurement Registry
//!
//! Fixed-capacity table pairing every [`MeasurementDefinition`] with its
//! [`MeasurementAccumulator`]. Slots never move: a removed measurement
//! leaves a hole that the next `add` fills. The slot index is the order
//! the scheduler and the uplink pipeline walk the table in, and the
//! pipeline's resumption cursor is an index into it.
//!
//! ```text
//!   slot:   0      1      2      3      4     ...  N-1
//!         [CC1 ] [TMP ] [    ] [PC1 ] [    ]      [    ]
//!                         ^ next add lands here
//! ```
//!
//! Edits that change how a sensor is powered (`add`, `remove`,
//! `set_period`) take the [`SensorInterface`] so the driver hears about
//! them.

use crate::accumulator::MeasurementAccumulator;
use crate::constants::buffers::MAX_MEASUREMENTS;
use crate::constants::time::DEFAULT_COLLECTION_TIME_MS;
use crate::errors::{ConfigError, ConfigResult};
use crate::measurement::{normalise_name, MeasurementDefinition};
use crate::traits::sensor::{resolve_collection_time, SensorInterface};

/// Where the boot-time table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSource {
    /// Persisted definitions were loaded
    Persisted,
    /// Nothing was persisted; defaults were installed and should be
    /// committed
    Defaults,
}

/// One occupied slot
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub(crate) def: MeasurementDefinition,
    pub(crate) acc: MeasurementAccumulator,
}

impl Entry {
    /// Definition in this slot
    pub fn definition(&self) -> &MeasurementDefinition {
        &self.def
    }

    /// Accumulator in this slot
    pub fn accumulator(&self) -> &MeasurementAccumulator {
        &self.acc
    }
}

/// Fixed-capacity measurement table
#[derive(Debug, Clone)]
pub struct MeasurementRegistry<const N: usize = MAX_MEASUREMENTS> {
    slots: [Option<Entry>; N],
    default_collection_time_ms: u32,
}

impl<const N: usize> MeasurementRegistry<N> {
    /// Empty table.
    pub fn new(default_collection_time_ms: u32) -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            default_collection_time_ms,
        }
    }

    /// Number of slots
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// No measurement defined
    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(|s| s.is_none())
    }

    /// Add a definition to the first free slot, returning its index.
    pub fn add<S>(&mut self, mut def: MeasurementDefinition, sensors: &mut S) -> ConfigResult<usize>
    where
        S: SensorInterface + ?Sized,
    {
        def.name = normalise_name(def.name.as_str())?;

        if self.index_of(def.name()).is_some() {
            meas_error!("Tried to add measurement with the same name: {}", def.name());
            return Err(ConfigError::DuplicateName);
        }

        let Some(index) = self.slots.iter().position(|s| s.is_none()) else {
            meas_error!("Could not find a space to add {}", def.name());
            return Err(ConfigError::TableFull);
        };

        let Some(value_kind) = sensors.value_kind(&def) else {
            meas_error!("No sensor interface for {} ({})", def.name(), def.kind.name());
            return Err(ConfigError::UnsupportedKind);
        };

        let collection_time = resolve_collection_time(sensors, &def, self.default_collection_time_ms);
        sensors.enable(&def, def.period > 0);

        self.slots[index] = Some(Entry {
            acc: MeasurementAccumulator::new(value_kind, collection_time),
            def,
        });
        Ok(index)
    }

    /// Disable the sensor and free its slot.
    pub fn remove<S>(&mut self, name: &str, sensors: &mut S) -> ConfigResult<MeasurementDefinition>
    where
        S: SensorInterface + ?Sized,
    {
        let index = self.index_of(name).ok_or(ConfigError::UnknownMeasurement)?;
        let entry = self.slots[index].take().ok_or(ConfigError::UnknownMeasurement)?;
        sensors.enable(&entry.def, false);
        Ok(entry.def)
    }

    /// Give a measurement a new name.
    pub fn rename(&mut self, old: &str, new: &str) -> ConfigResult<()> {
        let new_name = normalise_name(new)?;
        if self.index_of(new_name.as_str()).is_some() {
            meas_debug!("Measurement with new name already exists.");
            return Err(ConfigError::DuplicateName);
        }
        let entry = self.entry_mut(old).ok_or(ConfigError::UnknownMeasurement)?;
        entry.def.name = new_name;
        Ok(())
    }

    /// Change the period, powering the sensor up or down when it switches
    /// between enabled and disabled.
    pub fn set_period<S>(&mut self, name: &str, period: u8, sensors: &mut S) -> ConfigResult<()>
    where
        S: SensorInterface + ?Sized,
    {
        let entry = self.entry_mut(name).ok_or(ConfigError::UnknownMeasurement)?;
        if (period > 0) != (entry.def.period > 0) {
            sensors.enable(&entry.def, period > 0);
        }
        entry.def.period = period;
        Ok(())
    }

    /// Period in transmit ticks
    pub fn period(&self, name: &str) -> ConfigResult<u8> {
        self.definition(name).map(|d| d.period).ok_or(ConfigError::UnknownMeasurement)
    }

    /// Change the number of samples per period. Zero is rejected.
    pub fn set_samplecount(&mut self, name: &str, samplecount: u8) -> ConfigResult<()> {
        if samplecount == 0 {
            meas_error!("Cannot set the samplecount to 0.");
            return Err(ConfigError::InvalidSampleCount);
        }
        let entry = self.entry_mut(name).ok_or(ConfigError::UnknownMeasurement)?;
        entry.def.samplecount = samplecount;
        Ok(())
    }

    /// Samples per period
    pub fn samplecount(&self, name: &str) -> ConfigResult<u8> {
        self.definition(name).map(|d| d.samplecount).ok_or(ConfigError::UnknownMeasurement)
    }

    /// Mark or unmark a measurement as immediate
    pub fn set_immediate(&mut self, name: &str, is_immediate: bool) -> ConfigResult<()> {
        let entry = self.entry_mut(name).ok_or(ConfigError::UnknownMeasurement)?;
        entry.def.is_immediate = is_immediate;
        Ok(())
    }

    /// Whether a measurement is immediate
    pub fn is_immediate(&self, name: &str) -> ConfigResult<bool> {
        self.definition(name).map(|d| d.is_immediate).ok_or(ConfigError::UnknownMeasurement)
    }

    /// Ask for a measurement to be read and sent out of band.
    pub fn request_instant_send(&mut self, name: &str) -> ConfigResult<()> {
        let entry = self.entry_mut(name).ok_or(ConfigError::UnknownMeasurement)?;
        entry.acc.instant_send_requested = true;
        Ok(())
    }

    /// Visit every enabled definition in slot order. Stops early and
    /// returns false when the visitor does.
    pub fn for_each<F>(&self, mut visitor: F) -> bool
    where
        F: FnMut(&MeasurementDefinition) -> bool,
    {
        for entry in self.slots.iter().flatten() {
            if entry.def.period == 0 || entry.def.name.is_empty() {
                continue;
            }
            if !visitor(&entry.def) {
                return false;
            }
        }
        true
    }

    /// Occupied slots with their index
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Entry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|e| (i, e)))
    }

    /// Slot index of a measurement
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(e) if e.def.name() == name))
    }

    /// Entry by name
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.index_of(name).and_then(|i| self.slots[i].as_ref())
    }

    /// Definition by name
    pub fn definition(&self, name: &str) -> Option<&MeasurementDefinition> {
        self.get(name).map(|e| &e.def)
    }

    /// Accumulator by name
    pub fn accumulator(&self, name: &str) -> Option<&MeasurementAccumulator> {
        self.get(name).map(|e| &e.acc)
    }

    /// Install the boot-time table.
    ///
    /// Falls back to `defaults` when nothing was persisted. Definitions the
    /// sensor interface rejects are logged and skipped.
    pub fn load<S>(
        &mut self,
        persisted: &[MeasurementDefinition],
        defaults: &[MeasurementDefinition],
        sensors: &mut S,
    ) -> BootSource
    where
        S: SensorInterface + ?Sized,
    {
        let persisted_count = persisted.iter().filter(|d| !d.name.is_empty()).count();
        let (source, defs) = if persisted_count == 0 {
            meas_error!("No persistent loaded, load defaults.");
            (BootSource::Defaults, defaults)
        } else {
            meas_debug!("Loading measurements.");
            (BootSource::Persisted, persisted)
        };

        for def in defs.iter().filter(|d| !d.name.is_empty()) {
            if let Err(_e) = self.add(def.clone(), sensors) {
                meas_warn!("Skipping {} at boot: {}", def.name(), _e);
            }
        }
        source
    }

    pub(crate) fn slot_mut(&mut self, index: usize) -> Option<&mut Entry> {
        self.slots.get_mut(index).and_then(|s| s.as_mut())
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut Entry> {
        self.slots.iter_mut().flatten()
    }

    pub(crate) fn entry_mut(&mut self, name: &str) -> Option<&mut Entry> {
        let index = self.index_of(name)?;
        self.slots[index].as_mut()
    }

    pub(crate) fn default_collection_time_ms(&self) -> u32 {
        self.default_collection_time_ms
    }
}

impl<const N: usize> Default for MeasurementRegistry<N> {
    fn default() -> Self {
        Self::new(DEFAULT_COLLECTION_TIME_MS)
    }
}
