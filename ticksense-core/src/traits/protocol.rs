//! Uplink protocol interface
//!
//! A protocol owns one outgoing frame at a time: `init` opens it, `append`
//! and `append_instant` add entries, `send` hands it to the radio. An
//! `append` that fails with [`ProtocolError::BufferFull`](crate::errors::ProtocolError::BufferFull)
//! leaves the frame unchanged so the caller can send what fits and resume
//! later.

use crate::accumulator::MeasurementAccumulator;
use crate::errors::ProtocolResult;
use crate::measurement::{MeasurementDefinition, Reading};

/// Outgoing frame builder and link state
pub trait Protocol {
    /// Open a fresh frame.
    fn init(&mut self) -> ProtocolResult<()>;

    /// Add an aggregated measurement.
    fn append(&mut self, def: &MeasurementDefinition, acc: &MeasurementAccumulator) -> ProtocolResult<()>;

    /// Add a single out-of-band reading.
    fn append_instant(&mut self, def: &MeasurementDefinition, reading: &Reading) -> ProtocolResult<()> {
        self.append(def, &MeasurementAccumulator::from_reading(reading))
    }

    /// Transmit the current frame.
    fn send(&mut self) -> ProtocolResult<()>;

    /// The radio can take a frame now.
    fn send_ready(&self) -> bool;

    /// Sending is permitted at all (false while e.g. receiving firmware).
    fn send_allowed(&self) -> bool {
        true
    }

    /// A network link is up.
    fn is_connected(&self) -> bool;

    /// Drop the current frame and any in-flight transmission.
    fn reset(&mut self) {}
}

impl<P: Protocol + ?Sized> Protocol for &mut P {
    fn init(&mut self) -> ProtocolResult<()> {
        (**self).init()
    }

    fn append(&mut self, def: &MeasurementDefinition, acc: &MeasurementAccumulator) -> ProtocolResult<()> {
        (**self).append(def, acc)
    }

    fn append_instant(&mut self, def: &MeasurementDefinition, reading: &Reading) -> ProtocolResult<()> {
        (**self).append_instant(def, reading)
    }

    fn send(&mut self) -> ProtocolResult<()> {
        (**self).send()
    }

    fn send_ready(&self) -> bool {
        (**self).send_ready()
    }

    fn send_allowed(&self) -> bool {
        (**self).send_allowed()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
