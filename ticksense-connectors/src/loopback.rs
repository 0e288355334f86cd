//! In-memory transport for host tests and simulations

use std::vec::Vec;

use crate::{ConnectorError, Transport, TransportStats};

/// Transport that keeps every frame it is given
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    frames: Vec<Vec<u8>>,
    connected: bool,
    ready: bool,
    allowed: bool,
    fail_next: bool,
    stats: TransportStats,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// Connected, ready and allowed.
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            connected: true,
            ready: true,
            allowed: true,
            fail_next: false,
            stats: TransportStats::default(),
        }
    }

    /// Frames transmitted so far
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Frames decoded as JSON values
    pub fn frames_json(&self) -> serde_json::Result<Vec<serde_json::Value>> {
        self.frames.iter().map(|f| serde_json::from_slice(f)).collect()
    }

    /// Link statistics
    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    /// Bring the link up or down.
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Mark the radio busy or free.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Permit or forbid sending.
    pub fn set_allowed(&mut self, allowed: bool) {
        self.allowed = allowed;
    }

    /// Reject the next frame.
    pub fn fail_next(&mut self) {
        self.fail_next = true;
    }
}

impl Transport for LoopbackTransport {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), ConnectorError> {
        if !self.connected {
            self.stats.frames_failed += 1;
            return Err(ConnectorError::NotConnected);
        }
        if core::mem::take(&mut self.fail_next) {
            self.stats.frames_failed += 1;
            return Err(ConnectorError::Rejected { reason: "scripted failure" });
        }
        self.frames.push(frame.to_vec());
        self.stats.frames_sent += 1;
        self.stats.bytes_sent += frame.len() as u64;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn is_allowed(&self) -> bool {
        self.allowed
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) {
        self.stats.resets += 1;
    }
}
