//! Measurement definitions and readings
//!
//! A [`MeasurementDefinition`] says *what* to sample and *how often*:
//!
//! ```text
//!   period = 2, samplecount = 4, transmit interval = T
//!
//!   |<---------- T ---------->|<---------- T ---------->|
//!   ||     .     .     .     .||     .     .     .     .||
//!         ^           ^             ^           ^       send
//!   samples are spread evenly over period * T and sent once
//!   every `period` transmit ticks
//! ```
//!
//! A definition with `period == 0` or `samplecount == 0` is inactive: it is
//! never sampled and never sent.

use core::fmt;

use heapless::String;

use crate::constants::buffers::{MEASURE_NAME_LEN, VALUE_STR_LEN};
use crate::errors::{ConfigError, ConfigResult};

/// Inline measurement name
pub type MeasurementName = String<MEASURE_NAME_LEN>;

/// Inline text reading
pub type ReadingText = String<VALUE_STR_LEN>;

/// Sensor category of a measurement
///
/// The sensor interface maps a kind to a concrete driver and decides which
/// [`ValueKind`] its readings have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MeasurementKind {
    /// Register read from a Modbus device
    Modbus,
    /// Particulate matter, 10 micron
    Pm10,
    /// Particulate matter, 2.5 micron
    Pm25,
    /// RMS current from a clamp
    CurrentClamp,
    /// One-wire temperature probe
    W1Probe,
    /// HTU21D relative humidity
    Htu21dHumidity,
    /// HTU21D temperature
    Htu21dTemperature,
    /// Battery monitor
    BatteryMonitor,
    /// Pulse counter input
    PulseCount,
    /// Ambient light
    Light,
    /// Sound level
    Sound,
    /// Firmware version string
    FirmwareVersion,
    /// Configuration revision
    ConfigRevision,
    /// Four-to-twenty milliamp loop
    Ftma,
    /// Digital IO state
    IoReading,
    /// User defined
    Custom0,
    /// User defined
    Custom1,
}

impl MeasurementKind {
    /// Short human readable name
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Modbus => "MODBUS",
            Self::Pm10 => "PM10",
            Self::Pm25 => "PM25",
            Self::CurrentClamp => "CURRENT_CLAMP",
            Self::W1Probe => "W1_PROBE",
            Self::Htu21dHumidity => "HTU21D_HUM",
            Self::Htu21dTemperature => "HTU21D_TMP",
            Self::BatteryMonitor => "BAT_MON",
            Self::PulseCount => "PULSE_COUNT",
            Self::Light => "LIGHT",
            Self::Sound => "SOUND",
            Self::FirmwareVersion => "FW_VERSION",
            Self::ConfigRevision => "CONFIG_REVISION",
            Self::Ftma => "FTMA",
            Self::IoReading => "IO_READING",
            Self::Custom0 => "CUSTOM_0",
            Self::Custom1 => "CUSTOM_1",
        }
    }
}

/// Value type produced by a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueKind {
    /// Signed 64-bit integer
    #[default]
    Integer,
    /// 32-bit float
    Float,
    /// Short text, never aggregated
    Text,
}

/// One value returned by a sensor
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Reading {
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f32),
    /// Text value
    Text(ReadingText),
}

impl Reading {
    /// Value kind of this reading
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Integer(_) => ValueKind::Integer,
            Self::Float(_) => ValueKind::Float,
            Self::Text(_) => ValueKind::Text,
        }
    }

    /// Build a text reading, truncating at a character boundary if too long.
    pub fn text(s: &str) -> Self {
        let mut text = ReadingText::new();
        for c in s.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        Self::Text(text)
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{:.3}", v),
            Self::Text(s) => write!(f, "\"{}\"", s),
        }
    }
}

/// Normalise a user supplied name.
///
/// Trailing spaces are dropped and interior spaces become `_`. Empty and
/// over-long names are rejected.
pub fn normalise_name(raw: &str) -> ConfigResult<MeasurementName> {
    let trimmed = raw.trim_end_matches(' ');
    if trimmed.is_empty() || trimmed.len() > MEASURE_NAME_LEN {
        return Err(ConfigError::InvalidName);
    }
    let mut name = MeasurementName::new();
    for c in trimmed.chars() {
        let c = if c == ' ' { '_' } else { c };
        name.push(c).map_err(|_| ConfigError::InvalidName)?;
    }
    Ok(name)
}

/// What to sample and how often
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MeasurementDefinition {
    /// Unique name, at most [`MEASURE_NAME_LEN`] bytes
    pub name: MeasurementName,
    /// Sensor category
    pub kind: MeasurementKind,
    /// Transmit ticks per full sample-and-send cycle, 0 disables
    pub period: u8,
    /// Samples spread across one period, 0 disables
    pub samplecount: u8,
    /// Sample just before the period ends (single-sample only)
    pub is_immediate: bool,
}

impl MeasurementDefinition {
    /// Create a definition with a normalised name.
    pub fn new(name: &str, kind: MeasurementKind, period: u8, samplecount: u8) -> ConfigResult<Self> {
        Ok(Self {
            name: normalise_name(name)?,
            kind,
            period,
            samplecount,
            is_immediate: false,
        })
    }

    /// Mark the definition as immediate
    pub fn with_immediate(mut self, is_immediate: bool) -> Self {
        self.is_immediate = is_immediate;
        self
    }

    /// Name as a string slice
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Whether this definition takes part in scheduling and sending.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.period > 0 && self.samplecount > 0 && !self.name.is_empty()
    }

    /// Whether the definition is sent in the given transmit cycle.
    #[inline]
    pub fn is_due(&self, cycle_count: u32) -> bool {
        self.is_active() && cycle_count % self.period as u32 == 0
    }

    /// Immediate mode only applies to single-sample definitions.
    #[inline]
    pub fn effective_immediate(&self) -> bool {
        self.is_immediate && self.samplecount == 1
    }
}
