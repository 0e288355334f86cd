//! Uplink Protocol Connectors for TickSense Nodes
//!
//! ## Overview
//!
//! The core crate decides *what* goes into a frame and *when* it is sent;
//! this crate decides *how* the frame is encoded and hands the bytes to a
//! link supplied by the board.
//!
//! ## Design
//!
//! Encoding is separated from transport:
//! - **no_std support**: frames are built in fixed-size `heapless` buffers
//! - **Platform agnostic**: users provide their own [`Transport`]
//! - **Bounded**: an entry that does not fit is refused whole, which is
//!   what lets the core split a cycle into fragments
//!
//! ```text
//! ┌──────────────────┐     ┌──────────────────┐
//! │ TickSense Core   │     │ Platform Radio   │
//! │ (pipeline)       │     │ (LoRaWAN, modem) │
//! └────────┬─────────┘     └────────┬─────────┘
//!          │ Protocol               │
//!          ▼                        ▼
//! ┌──────────────────┐     ┌──────────────────┐
//! │ JsonBlob         │────▶│ Transport Trait  │
//! │ (frame encoder)  │     │ (User Provided)  │
//! └──────────────────┘     └──────────────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```rust
//! use ticksense_connectors::{json::JsonBlob, loopback::LoopbackTransport};
//! use ticksense_core::prelude::*;
//!
//! let mut blob: JsonBlob<_, 128> = JsonBlob::new(LoopbackTransport::new());
//! let def = MeasurementDefinition::new("TMP", MeasurementKind::W1Probe, 1, 1).unwrap();
//!
//! blob.init().unwrap();
//! blob.append_instant(&def, &Reading::Float(21.5)).unwrap();
//! blob.send().unwrap();
//!
//! assert_eq!(blob.transport().frames()[0], br#"{"TMP" : 21.500}"#);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod json;

#[cfg(feature = "std")]
pub mod loopback;

pub use json::JsonBlob;
#[cfg(feature = "std")]
pub use loopback::LoopbackTransport;

use thiserror_no_std::Error;

/// Common transport errors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorError {
    /// No link to send over
    #[error("Not connected")]
    NotConnected,

    /// The link did not accept the frame in time
    #[error("Timeout")]
    Timeout,

    /// The link refused the frame
    #[error("Frame rejected: {reason}")]
    Rejected {
        /// Why the frame was refused
        reason: &'static str,
    },
}

/// Byte link a frame encoder sends over
pub trait Transport {
    /// Send one encoded frame.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), ConnectorError>;

    /// The link can take a frame now.
    fn is_ready(&self) -> bool;

    /// Sending is permitted at all.
    fn is_allowed(&self) -> bool {
        true
    }

    /// The link is up.
    fn is_connected(&self) -> bool;

    /// Abandon any in-flight transmission.
    fn reset(&mut self) {}
}

/// Transport statistics common to all links
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    /// Frames sent successfully
    pub frames_sent: u32,
    /// Frames that failed to send
    pub frames_failed: u32,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Times the link was reset
    pub resets: u32,
}
