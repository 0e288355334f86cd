//! Instant send path
//!
//! Measurements flagged with `instant_send_requested` are read once,
//! synchronously, and sent in a frame of their own without touching their
//! periodic aggregate.
//!
//! The path stays out of the way of scheduled traffic: it refuses while a
//! fragmented cycle is still being sent and when the next scheduled send is
//! closer than the guard window. A refused request stays flagged and goes
//! out on a later tick.

use crate::cycle::TransmitCycle;
use crate::errors::SendError;
use crate::pipeline::TransmissionPipeline;
use crate::reading::read_entry;
use crate::registry::MeasurementRegistry;
use crate::time::TimeSource;
use crate::traits::{Platform, Protocol, SensorInterface};

/// Out-of-band single reading sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstantSendPath {
    guard_ms: u32,
}

impl InstantSendPath {
    /// Path refusing sends within `guard_ms` of the next scheduled send.
    pub const fn new(guard_ms: u32) -> Self {
        Self { guard_ms }
    }

    /// Guard window (milliseconds)
    pub fn guard_ms(&self) -> u32 {
        self.guard_ms
    }

    /// Whether any measurement asked for an instant send.
    pub fn has_requests<const N: usize>(registry: &MeasurementRegistry<N>) -> bool {
        registry.iter().any(|(_, e)| e.acc.instant_send_requested)
    }

    /// Read and send every flagged measurement.
    ///
    /// Returns how many readings were sent; `Ok(0)` when nothing was
    /// flagged.
    #[allow(clippy::too_many_arguments)]
    pub fn run<S, P, H, T, const N: usize>(
        &self,
        registry: &mut MeasurementRegistry<N>,
        sensors: &mut S,
        protocol: &mut P,
        platform: &mut H,
        clock: &T,
        pipeline: &TransmissionPipeline<N>,
        cycle: &TransmitCycle,
    ) -> Result<u16, SendError>
    where
        S: SensorInterface + ?Sized,
        P: Protocol + ?Sized,
        H: Platform + ?Sized,
        T: TimeSource + ?Sized,
    {
        if !Self::has_requests(registry) {
            return Ok(0);
        }

        if pipeline.is_mid_fragment() {
            meas_debug!("Cannot instant send, there is a measurement send underway.");
            return Err(SendError::FragmentInProgress);
        }
        if cycle.time_to_next(clock.now()) <= self.guard_ms as u64 {
            meas_debug!("Cannot send instant send, scheduled uplink soon.");
            return Err(SendError::ScheduledSendImminent);
        }

        protocol.init().map_err(|e| {
            meas_debug!("Could not initialise the frame for the protocol.");
            SendError::Protocol(e)
        })?;

        let default_ms = registry.default_collection_time_ms();
        let mut count: u16 = 0;
        for entry in registry.entries_mut() {
            if !entry.acc.instant_send_requested {
                continue;
            }
            entry.acc.instant_send_requested = false;

            let reading = match read_entry(entry, sensors, platform, clock, default_ms, None) {
                Ok(r) => r,
                Err(_e) => {
                    meas_debug!("Could not get measurement '{}' for instant send: {}", entry.def.name(), _e);
                    continue;
                }
            };
            if protocol.append_instant(&entry.def, &reading).is_err() {
                meas_debug!("Could not add measurement '{}' to frame.", entry.def.name());
                break;
            }
            count = count.saturating_add(1);
        }

        if count == 0 {
            meas_debug!("No measurements were added, not sending.");
            return Err(SendError::NothingQueued);
        }
        protocol.send()?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::MeasurementAccumulator;
    use crate::errors::{ProtocolResult, SensorResult};
    use crate::measurement::{MeasurementDefinition, MeasurementKind, Reading, ValueKind};
    use crate::time::FixedTime;

    struct Constant;

    impl SensorInterface for Constant {
        fn value_kind(&self, _def: &MeasurementDefinition) -> Option<ValueKind> {
            Some(ValueKind::Integer)
        }

        fn collect(&mut self, _def: &MeasurementDefinition) -> SensorResult<Reading> {
            Ok(Reading::Integer(99))
        }
    }

    #[derive(Default)]
    struct Capture {
        instants: heapless::Vec<Reading, 4>,
        sends: u32,
    }

    impl Protocol for Capture {
        fn init(&mut self) -> ProtocolResult<()> {
            self.instants.clear();
            Ok(())
        }

        fn append(&mut self, _def: &MeasurementDefinition, _acc: &MeasurementAccumulator) -> ProtocolResult<()> {
            Ok(())
        }

        fn append_instant(&mut self, _def: &MeasurementDefinition, reading: &Reading) -> ProtocolResult<()> {
            let _ = self.instants.push(reading.clone());
            Ok(())
        }

        fn send(&mut self) -> ProtocolResult<()> {
            self.sends += 1;
            Ok(())
        }

        fn send_ready(&self) -> bool {
            true
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    fn setup() -> (MeasurementRegistry<4>, Constant) {
        let mut sensors = Constant;
        let mut reg = MeasurementRegistry::default();
        let def = MeasurementDefinition::new("PM", MeasurementKind::Pm25, 1, 1).unwrap();
        reg.add(def, &mut sensors).unwrap();
        (reg, sensors)
    }

    #[test]
    fn nothing_flagged_is_a_no_op() {
        let (mut reg, mut sensors) = setup();
        let mut proto = Capture::default();
        let clock = FixedTime::new(0);
        let pipe = TransmissionPipeline::new();
        let cycle = TransmitCycle::new(60_000, 0);
        let path = InstantSendPath::new(15_000);

        let r = path.run(&mut reg, &mut sensors, &mut proto, &mut (), &clock, &pipe, &cycle);
        assert_eq!(r, Ok(0));
        assert_eq!(proto.sends, 0);
    }

    #[test]
    fn flagged_reading_is_sent() {
        let (mut reg, mut sensors) = setup();
        reg.request_instant_send("PM").unwrap();
        let mut proto = Capture::default();
        let clock = FixedTime::new(1_000);
        let pipe = TransmissionPipeline::new();
        let cycle = TransmitCycle::new(60_000, 0);
        let path = InstantSendPath::new(15_000);

        let r = path.run(&mut reg, &mut sensors, &mut proto, &mut (), &clock, &pipe, &cycle);
        assert_eq!(r, Ok(1));
        assert_eq!(proto.instants.as_slice(), &[Reading::Integer(99)]);
        assert_eq!(proto.sends, 1);
        assert!(!reg.accumulator("PM").unwrap().instant_send_requested());
        assert_eq!(reg.accumulator("PM").unwrap().samples_taken(), 0);
    }

    #[test]
    fn refused_close_to_scheduled_send() {
        let (mut reg, mut sensors) = setup();
        reg.request_instant_send("PM").unwrap();
        let mut proto = Capture::default();
        let clock = FixedTime::new(50_000);
        let pipe = TransmissionPipeline::new();
        let cycle = TransmitCycle::new(60_000, 0);
        let path = InstantSendPath::new(15_000);

        let r = path.run(&mut reg, &mut sensors, &mut proto, &mut (), &clock, &pipe, &cycle);
        assert_eq!(r, Err(SendError::ScheduledSendImminent));
        assert_eq!(proto.sends, 0);
        assert!(reg.accumulator("PM").unwrap().instant_send_requested());
    }
}
