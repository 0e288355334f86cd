//! Sensor node driver
//!
//! [`SensorNode`] owns every piece of the tick loop together with the
//! collaborators it drives. The firmware main loop calls
//! [`SensorNode::iterate`] forever; each call does a bounded amount of work
//! and may end in a nap.
//!
//! ## One Iteration
//!
//! ```text
//!   disabled? ──yes──► return
//!       │
//!   connected? ──no──► drop cycle state (once), poll in-flight, return
//!       │
//!   reconnected? ──yes──► restart transmit tick, return
//!       │
//!   radio ready ──► instant sends
//!       │
//!   scheduler due ──► Scheduler::tick
//!       │
//!   tick over ──► cycle_count += 1, TransmissionPipeline::maybe_send
//!       │
//!   poll in-flight ──none──► SleepGovernor
//! ```
//!
//! ## Example
//!
//! ```rust
//! use ticksense_core::prelude::*;
//!
//! struct Thermometer;
//!
//! impl SensorInterface for Thermometer {
//!     fn value_kind(&self, _def: &MeasurementDefinition) -> Option<ValueKind> {
//!         Some(ValueKind::Float)
//!     }
//!
//!     fn collect(&mut self, _def: &MeasurementDefinition) -> SensorResult<Reading> {
//!         Ok(Reading::Float(21.5))
//!     }
//! }
//!
//! struct Offline;
//!
//! impl Protocol for Offline {
//!     fn init(&mut self) -> ProtocolResult<()> { Ok(()) }
//!     fn append(&mut self, _: &MeasurementDefinition, _: &MeasurementAccumulator) -> ProtocolResult<()> { Ok(()) }
//!     fn send(&mut self) -> ProtocolResult<()> { Ok(()) }
//!     fn send_ready(&self) -> bool { false }
//!     fn is_connected(&self) -> bool { false }
//! }
//!
//! let clock = FixedTime::new(0);
//! let mut node: SensorNode<_, _, _, _> =
//!     SensorNode::new(NodeConfig::new(), Thermometer, Offline, (), &clock);
//!
//! let def = MeasurementDefinition::new("TMP", MeasurementKind::W1Probe, 1, 1).unwrap();
//! node.add(def).unwrap();
//! assert_eq!(node.iterate(), Iteration::Disconnected);
//! ```

use crate::config::{NodeConfig, PowerMode};
use crate::constants::buffers::MAX_MEASUREMENTS;
use crate::constants::time::READ_TIMEOUT_TENTHS;
use crate::cycle::TransmitCycle;
use crate::errors::{ConfigError, ConfigResult, ReadError, SendError};
use crate::instant::InstantSendPath;
use crate::measurement::{MeasurementDefinition, Reading};
use crate::pipeline::{PipelineStats, SendOutcome, TransmissionPipeline};
use crate::reading::read_measurement;
use crate::registry::{BootSource, MeasurementRegistry};
use crate::scheduler::{Scheduler, SchedulerStats};
use crate::sleep::{SleepDecision, SleepGovernor};
use crate::time::TimeSource;
use crate::traits::sensor::resolve_collection_time;
use crate::traits::{Platform, Protocol, SensorInterface};

/// What one call to [`SensorNode::iterate`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Iteration {
    /// Measurements are globally disabled
    Disabled,
    /// No link; only in-flight acquisitions were polled
    Disconnected,
    /// First connected pass after a disconnect; the transmit tick restarted
    Reconnected,
    /// A full pass ran
    Ran {
        /// Pipeline outcome if the transmit tick was over
        send: Option<SendOutcome>,
        /// Sleep decision if nothing was in flight
        sleep: Option<SleepDecision>,
    },
}

/// Measurement scheduling and uplink driver
pub struct SensorNode<S, P, H, T, const N: usize = MAX_MEASUREMENTS>
where
    S: SensorInterface,
    P: Protocol,
    H: Platform,
    T: TimeSource,
{
    config: NodeConfig,
    registry: MeasurementRegistry<N>,
    scheduler: Scheduler,
    cycle: TransmitCycle,
    pipeline: TransmissionPipeline<N>,
    instant: InstantSendPath,
    governor: SleepGovernor,
    sensors: S,
    protocol: P,
    platform: H,
    clock: T,
    enabled: bool,
    disconnected: bool,
}

impl<S, P, H, T, const N: usize> SensorNode<S, P, H, T, N>
where
    S: SensorInterface,
    P: Protocol,
    H: Platform,
    T: TimeSource,
{
    /// Create a node with an empty measurement table.
    ///
    /// The transmit tick starts at the clock's current time.
    pub fn new(config: NodeConfig, sensors: S, protocol: P, platform: H, clock: T) -> Self {
        let now = clock.now();
        Self {
            registry: MeasurementRegistry::new(config.default_collection_time_ms),
            scheduler: Scheduler::new(config.immediate_guard_ms, config.default_collection_time_ms),
            cycle: TransmitCycle::new(config.transmit_interval_ms, now),
            pipeline: TransmissionPipeline::new(),
            instant: InstantSendPath::new(config.instant_send_guard_ms),
            governor: SleepGovernor::new(config.power_mode, config.min_sleep_ms),
            config,
            sensors,
            protocol,
            platform,
            clock,
            enabled: true,
            disconnected: false,
        }
    }

    /// Run one pass of the tick loop.
    pub fn iterate(&mut self) -> Iteration {
        if !self.enabled {
            return Iteration::Disabled;
        }

        if !self.protocol.is_connected() {
            if !self.disconnected {
                meas_debug!("Not connected, dropping cycle state.");
                self.disconnected = true;
                self.pipeline.reset_cursors();
            }
            self.scheduler.poll_in_flight(&mut self.registry, &mut self.sensors);
            return Iteration::Disconnected;
        }

        if self.disconnected {
            meas_debug!("Connected, restarting transmit tick.");
            self.disconnected = false;
            self.cycle.restart(self.clock.now());
            return Iteration::Reconnected;
        }

        if self.protocol.send_ready() {
            self.run_instant_sends();
        }

        let now = self.clock.now();
        if self.scheduler.is_due(now) {
            self.scheduler.tick(&mut self.registry, &mut self.sensors, &self.cycle, now);
        }

        let now = self.clock.now();
        let send = if self.cycle.is_due(now) {
            let _count = self.cycle.advance();
            meas_debug!("Transmit tick {}", _count);
            Some(self.pipeline.maybe_send(&mut self.registry, &mut self.protocol, &mut self.cycle, now))
        } else {
            None
        };

        let active = self.scheduler.poll_in_flight(&mut self.registry, &mut self.sensors);
        let sleep = if active == 0 {
            let now = self.clock.now();
            Some(self.governor.maybe_sleep(&self.scheduler, &self.cycle, &mut self.platform, now))
        } else {
            None
        };

        Iteration::Ran { send, sleep }
    }

    fn run_instant_sends(&mut self) {
        match self.instant.run(
            &mut self.registry,
            &mut self.sensors,
            &mut self.protocol,
            &mut self.platform,
            &self.clock,
            &self.pipeline,
            &self.cycle,
        ) {
            Ok(0) => {}
            Ok(_sent) => meas_debug!("Instant sent {} measurements", _sent),
            Err(_e) => meas_debug!("Instant send not done: {}", _e),
        }
    }

    /// Report the protocol's acknowledgement of the last uplink.
    pub fn on_ack(&mut self, success: bool) -> Option<SendOutcome> {
        let now = self.clock.now();
        self.pipeline.on_ack(
            success,
            &mut self.registry,
            &mut self.sensors,
            &mut self.protocol,
            &mut self.cycle,
            now,
        )
    }

    /// Globally enable or disable measurements.
    ///
    /// Re-enabling starts a fresh transmit tick.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            let now = self.clock.now();
            self.cycle.restart(now);
            self.scheduler.reset(now);
        }
        self.enabled = enabled;
    }

    /// Whether measurements are enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Change the sleep policy.
    pub fn set_power_mode(&mut self, mode: PowerMode) {
        self.config.power_mode = mode;
        self.governor.set_power_mode(mode);
    }

    /// Change the transmit interval.
    ///
    /// Rejected if shorter than the minimum interval or not longer than the
    /// immediate guard band.
    pub fn set_transmit_interval_ms(&mut self, interval_ms: u32) -> ConfigResult<()> {
        let candidate = self.config.with_transmit_interval_ms(interval_ms);
        candidate.validate()?;
        self.config = candidate;
        self.cycle.set_interval_ms(interval_ms);
        Ok(())
    }

    /// Current transmit interval (milliseconds)
    pub fn transmit_interval_ms(&self) -> u32 {
        self.cycle.interval_ms()
    }

    /// Active configuration
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    // ===== SYNCHRONOUS READS =====

    /// Read a measurement now, bounded by its collection time.
    pub fn get_reading(&mut self, name: &str) -> Result<Reading, ReadError> {
        read_measurement(&mut self.registry, name, &mut self.sensors, &mut self.platform, &self.clock, None)
    }

    /// Read a measurement now, bounded by `timeout_ms`.
    pub fn get_reading_with_timeout(&mut self, name: &str, timeout_ms: u32) -> Result<Reading, ReadError> {
        read_measurement(
            &mut self.registry,
            name,
            &mut self.sensors,
            &mut self.platform,
            &self.clock,
            Some(timeout_ms),
        )
    }

    /// Timeout a caller should allow for a synchronous read (milliseconds).
    ///
    /// One and a half times the sensor's reported collection time.
    pub fn collection_timeout(&mut self, name: &str) -> ConfigResult<u32> {
        let default_ms = self.config.default_collection_time_ms;
        let def = self.registry.definition(name).ok_or(ConfigError::UnknownMeasurement)?;
        let ms = resolve_collection_time(&mut self.sensors, def, default_ms);
        Ok((ms as u64 * READ_TIMEOUT_TENTHS as u64 / 10).min(u32::MAX as u64) as u32)
    }

    /// Read one measurement and send it in a frame of its own.
    pub fn send_test(&mut self, name: &str) -> Result<(), SendError> {
        if !self.protocol.is_connected() {
            meas_debug!("Not connected, cannot send.");
            return Err(SendError::NotConnected);
        }
        if !self.protocol.send_ready() {
            meas_debug!("Radio not ready, cannot send.");
            return Err(SendError::NotReady);
        }
        self.protocol.init()?;

        let reading = self.get_reading(name)?;
        let def = self.registry.definition(name).ok_or(ConfigError::UnknownMeasurement).map_err(ReadError::from)?;
        if let Err(e) = self.protocol.append_instant(def, &reading) {
            meas_debug!("Failed to add {} to the frame.", name);
            return Err(e.into());
        }
        self.protocol.send()?;
        meas_debug!("Sent {} = {}", name, reading);
        Ok(())
    }

    // ===== REGISTRY =====

    /// Add a measurement.
    pub fn add(&mut self, def: MeasurementDefinition) -> ConfigResult<usize> {
        self.registry.add(def, &mut self.sensors)
    }

    /// Remove a measurement, disabling its sensor first.
    pub fn remove(&mut self, name: &str) -> ConfigResult<MeasurementDefinition> {
        self.registry.remove(name, &mut self.sensors)
    }

    /// Rename a measurement.
    pub fn rename(&mut self, old: &str, new: &str) -> ConfigResult<()> {
        self.registry.rename(old, new)
    }

    /// Set how many transmit ticks one reporting period spans.
    pub fn set_period(&mut self, name: &str, period: u8) -> ConfigResult<()> {
        self.registry.set_period(name, period, &mut self.sensors)
    }

    /// Reporting period in transmit ticks
    pub fn period(&self, name: &str) -> ConfigResult<u8> {
        self.registry.period(name)
    }

    /// Set how many samples are taken per period.
    pub fn set_samplecount(&mut self, name: &str, samplecount: u8) -> ConfigResult<()> {
        self.registry.set_samplecount(name, samplecount)
    }

    /// Samples taken per period
    pub fn samplecount(&self, name: &str) -> ConfigResult<u8> {
        self.registry.samplecount(name)
    }

    /// Mark a measurement as sampled just before its period closes.
    pub fn set_immediate(&mut self, name: &str, is_immediate: bool) -> ConfigResult<()> {
        self.registry.set_immediate(name, is_immediate)
    }

    /// Whether a measurement is sampled just before its period closes
    pub fn is_immediate(&self, name: &str) -> ConfigResult<bool> {
        self.registry.is_immediate(name)
    }

    /// Ask for a measurement to be read and sent out of band.
    pub fn request_instant_send(&mut self, name: &str) -> ConfigResult<()> {
        self.registry.request_instant_send(name)
    }

    /// Visit every active definition in table order until `visitor`
    /// returns `false`.
    pub fn for_each<F>(&self, visitor: F) -> bool
    where
        F: FnMut(&MeasurementDefinition) -> bool,
    {
        self.registry.for_each(visitor)
    }

    /// Install the boot-time measurement table.
    pub fn load(&mut self, persisted: &[MeasurementDefinition], defaults: &[MeasurementDefinition]) -> BootSource {
        self.registry.load(persisted, defaults, &mut self.sensors)
    }

    // ===== INSPECTION =====

    /// Measurement table
    pub fn registry(&self) -> &MeasurementRegistry<N> {
        &self.registry
    }

    /// Sampling scheduler
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Scheduler counters
    pub fn scheduler_stats(&self) -> &SchedulerStats {
        self.scheduler.stats()
    }

    /// Transmission pipeline
    pub fn pipeline(&self) -> &TransmissionPipeline<N> {
        &self.pipeline
    }

    /// Pipeline counters
    pub fn pipeline_stats(&self) -> &PipelineStats {
        self.pipeline.stats()
    }

    /// Transmit tick clock
    pub fn cycle(&self) -> &TransmitCycle {
        &self.cycle
    }

    /// Sleep governor
    pub fn governor(&self) -> &SleepGovernor {
        &self.governor
    }

    /// Sensor interface
    pub fn sensors(&self) -> &S {
        &self.sensors
    }

    /// Sensor interface, mutably
    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    /// Uplink protocol
    pub fn protocol(&self) -> &P {
        &self.protocol
    }

    /// Uplink protocol, mutably
    pub fn protocol_mut(&mut self) -> &mut P {
        &mut self.protocol
    }

    /// Board services
    pub fn platform(&self) -> &H {
        &self.platform
    }

    /// Board services, mutably
    pub fn platform_mut(&mut self) -> &mut H {
        &mut self.platform
    }

    /// Time source
    pub fn clock(&self) -> &T {
        &self.clock
    }
}
