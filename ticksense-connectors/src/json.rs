//! JSON blob frame encoder
//!
//! Encodes a frame as one flat JSON object:
//!
//! ```text
//! {"TMP" : 21.375,"TMP_min" : 20.500,"TMP_max" : 22.250,"PC1" : 14,"FW" : "1.4.2"}
//! ```
//!
//! - one sample: `"NAME" : value`
//! - several samples: the mean under `NAME`, plus `NAME_min` and `NAME_max`
//! - integer means use integer division, floats print three decimals
//! - text is quoted and escaped
//!
//! Two bytes are always kept free for the closing brace. A measurement's
//! fields are written together or not at all: if any of them does not fit
//! the buffer is rolled back and the append fails with `BufferFull`.

use core::fmt::Write;

use heapless::String;
use ticksense_core::errors::{ProtocolError, ProtocolResult};
use ticksense_core::measurement::MeasurementDefinition;
use ticksense_core::{Aggregate, MeasurementAccumulator, Protocol};

use crate::Transport;

/// Bytes held back for the closing brace
const JSON_CLOSE_SIZE: usize = 2;

/// Bounded JSON object encoder over a [`Transport`]
#[derive(Debug)]
pub struct JsonBlob<T: Transport, const N: usize> {
    buf: String<N>,
    transport: T,
}

impl<T: Transport, const N: usize> JsonBlob<T, N> {
    /// Encoder with an empty buffer.
    pub fn new(transport: T) -> Self {
        Self { buf: String::new(), transport }
    }

    /// Underlying link
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Underlying link, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Frame built so far
    pub fn frame(&self) -> &str {
        self.buf.as_str()
    }

    fn fits(&self) -> bool {
        self.buf.len() + JSON_CLOSE_SIZE < N
    }

    /// Append raw text, keeping room to close the object.
    fn push(&mut self, args: core::fmt::Arguments<'_>) -> bool {
        self.buf.write_fmt(args).is_ok() && self.fits()
    }

    /// Append one `"name" : value` field with a separating comma.
    fn field(&mut self, name: &str, suffix: &str, value: core::fmt::Arguments<'_>) -> bool {
        if self.buf.is_empty() {
            return false;
        }
        if !self.buf.ends_with('{') && !self.push(format_args!(",")) {
            return false;
        }
        self.push(format_args!("\"{}{}\" : {}", name, suffix, value))
    }

    fn text_field(&mut self, name: &str, text: &str) -> bool {
        if !self.field(name, "", format_args!("\"")) {
            return false;
        }
        for c in text.chars() {
            let ok = match c {
                '"' => self.push(format_args!("\\\"")),
                '\\' => self.push(format_args!("\\\\")),
                c if (c as u32) < 0x20 => self.push(format_args!("\\u{:04x}", c as u32)),
                c => self.push(format_args!("{}", c)),
            };
            if !ok {
                return false;
            }
        }
        self.push(format_args!("\""))
    }

    fn encode(&mut self, name: &str, acc: &MeasurementAccumulator) -> bool {
        let samples = acc.samples_taken();
        match acc.aggregate() {
            Aggregate::Empty => true,
            Aggregate::Text(s) => self.text_field(name, s.as_str()),
            Aggregate::Integer { sum, .. } if samples <= 1 => self.field(name, "", format_args!("{}", sum)),
            Aggregate::Integer { sum, min, max } => {
                let mean = sum / samples as i64;
                self.field(name, "", format_args!("{}", mean))
                    && self.field(name, "_min", format_args!("{}", min))
                    && self.field(name, "_max", format_args!("{}", max))
            }
            Aggregate::Float { sum, .. } if samples <= 1 => self.field(name, "", format_args!("{:.3}", sum)),
            Aggregate::Float { sum, min, max } => {
                let mean = sum / samples as f32;
                self.field(name, "", format_args!("{:.3}", mean))
                    && self.field(name, "_min", format_args!("{:.3}", min))
                    && self.field(name, "_max", format_args!("{:.3}", max))
            }
        }
    }
}

impl<T: Transport, const N: usize> Protocol for JsonBlob<T, N> {
    fn init(&mut self) -> ProtocolResult<()> {
        self.buf.clear();
        if self.push(format_args!("{{")) {
            Ok(())
        } else {
            self.buf.clear();
            Err(ProtocolError::InitFailed)
        }
    }

    fn append(&mut self, def: &MeasurementDefinition, acc: &MeasurementAccumulator) -> ProtocolResult<()> {
        let mark = self.buf.len();
        if self.encode(def.name(), acc) {
            Ok(())
        } else {
            self.buf.truncate(mark);
            Err(ProtocolError::BufferFull)
        }
    }

    fn send(&mut self) -> ProtocolResult<()> {
        if self.buf.is_empty() || self.buf.push('}').is_err() {
            return Err(ProtocolError::SendFailed);
        }
        self.transport.transmit(self.buf.as_bytes()).map_err(|e| match e {
            crate::ConnectorError::NotConnected => ProtocolError::NotConnected,
            _ => ProtocolError::SendFailed,
        })
    }

    fn send_ready(&self) -> bool {
        self.transport.is_ready()
    }

    fn send_allowed(&self) -> bool {
        self.transport.is_allowed()
    }

    fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.transport.reset();
    }
}
