//! Common test doubles for integration tests
//!
//! This module provides:
//! - A scriptable sensor interface with per-measurement channels
//! - A recording protocol with per-frame capacity limits
//! - A simulated board whose sleep and busy-wait advance a shared clock
//! - A driver loop helper

#![allow(dead_code)]

use std::collections::VecDeque;

use ticksense_core::prelude::*;

// ===== SENSORS =====

/// What a sensor saw, in call order
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Start { name: String, at: Timestamp, isolated: bool },
    Collect { name: String, at: Timestamp },
    Enable { name: String, on: bool },
    Acked { name: String },
}

/// Scripted behaviour of one measurement
#[derive(Debug, Clone)]
pub struct Channel {
    pub name: String,
    pub kind: ValueKind,
    pub collection_time: Option<u32>,
    pub readings: VecDeque<Reading>,
    pub fallback: Reading,
    pub busy_starts: u32,
    pub failed_collects: u32,
    pub polls_until_ready: u32,
    pub enabled: bool,
}

impl Channel {
    pub fn integer(name: &str, readings: &[i64]) -> Self {
        Self {
            name: name.to_string(),
            kind: ValueKind::Integer,
            collection_time: None,
            readings: readings.iter().map(|v| Reading::Integer(*v)).collect(),
            fallback: Reading::Integer(1),
            busy_starts: 0,
            failed_collects: 0,
            polls_until_ready: 0,
            enabled: false,
        }
    }

    pub fn float(name: &str, readings: &[f32]) -> Self {
        Self {
            kind: ValueKind::Float,
            readings: readings.iter().map(|v| Reading::Float(*v)).collect(),
            fallback: Reading::Float(0.0),
            ..Self::integer(name, &[])
        }
    }

    pub fn with_collection_time(mut self, ms: u32) -> Self {
        self.collection_time = Some(ms);
        self
    }

    pub fn with_busy_starts(mut self, n: u32) -> Self {
        self.busy_starts = n;
        self
    }

    pub fn with_failed_collects(mut self, n: u32) -> Self {
        self.failed_collects = n;
        self
    }

    pub fn with_polls(mut self, n: u32) -> Self {
        self.polls_until_ready = n;
        self
    }
}

/// Sensor interface driven by a list of channels
pub struct ScriptedSensors<'a> {
    clock: &'a FixedTime,
    pub channels: Vec<Channel>,
    pub events: Vec<SensorEvent>,
    polls_left: Vec<u32>,
}

impl<'a> ScriptedSensors<'a> {
    pub fn new(clock: &'a FixedTime) -> Self {
        Self { clock, channels: Vec::new(), events: Vec::new(), polls_left: Vec::new() }
    }

    pub fn with(mut self, channel: Channel) -> Self {
        self.channels.push(channel);
        self.polls_left.push(0);
        self
    }

    fn index(&self, def: &MeasurementDefinition) -> Option<usize> {
        self.channels.iter().position(|c| c.name == def.name())
    }

    pub fn channel(&self, name: &str) -> &Channel {
        self.channels.iter().find(|c| c.name == name).expect("unknown channel")
    }

    pub fn starts(&self, name: &str) -> Vec<Timestamp> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SensorEvent::Start { name: n, at, isolated: false } if n == name => Some(*at),
                _ => None,
            })
            .collect()
    }

    pub fn collects(&self, name: &str) -> Vec<Timestamp> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SensorEvent::Collect { name: n, at } if n == name => Some(*at),
                _ => None,
            })
            .collect()
    }

    pub fn acked(&self) -> Vec<String> {
        self.events
            .iter()
            .filter_map(|e| match e {
                SensorEvent::Acked { name } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }
}

impl SensorInterface for ScriptedSensors<'_> {
    fn value_kind(&self, def: &MeasurementDefinition) -> Option<ValueKind> {
        self.index(def).map(|i| self.channels[i].kind)
    }

    fn collection_time(&mut self, def: &MeasurementDefinition) -> Option<SensorResult<u32>> {
        let i = self.index(def)?;
        self.channels[i].collection_time.map(Ok)
    }

    fn start(&mut self, def: &MeasurementDefinition, isolated: bool) -> SensorResult<()> {
        let i = self.index(def).ok_or(nb::Error::Other(SensorError::Failed { reason: "unknown" }))?;
        let channel = &mut self.channels[i];
        if channel.busy_starts > 0 {
            channel.busy_starts -= 1;
            return Err(nb::Error::WouldBlock);
        }
        self.polls_left[i] = channel.polls_until_ready;
        self.events.push(SensorEvent::Start { name: channel.name.clone(), at: self.clock.now(), isolated });
        Ok(())
    }

    fn poll(&mut self, def: &MeasurementDefinition) -> SensorResult<()> {
        let i = self.index(def).ok_or(nb::Error::Other(SensorError::Failed { reason: "unknown" }))?;
        if self.polls_left[i] > 0 {
            self.polls_left[i] -= 1;
            return Err(nb::Error::WouldBlock);
        }
        Ok(())
    }

    fn collect(&mut self, def: &MeasurementDefinition) -> SensorResult<Reading> {
        let i = self.index(def).ok_or(nb::Error::Other(SensorError::Failed { reason: "unknown" }))?;
        if self.polls_left[i] > 0 {
            return Err(nb::Error::WouldBlock);
        }
        let channel = &mut self.channels[i];
        self.events.push(SensorEvent::Collect { name: channel.name.clone(), at: self.clock.now() });
        if channel.failed_collects > 0 {
            channel.failed_collects -= 1;
            return Err(nb::Error::Other(SensorError::Failed { reason: "scripted failure" }));
        }
        Ok(channel.readings.pop_front().unwrap_or_else(|| channel.fallback.clone()))
    }

    fn enable(&mut self, def: &MeasurementDefinition, enabled: bool) {
        if let Some(i) = self.index(def) {
            self.channels[i].enabled = enabled;
            self.events.push(SensorEvent::Enable { name: def.name().to_string(), on: enabled });
        }
    }

    fn is_enabled(&self, def: &MeasurementDefinition) -> Option<bool> {
        self.index(def).map(|i| self.channels[i].enabled)
    }

    fn acked(&mut self, def: &MeasurementDefinition) {
        self.events.push(SensorEvent::Acked { name: def.name().to_string() });
    }
}

// ===== PROTOCOL =====

/// One measurement as it was handed to the protocol
#[derive(Debug, Clone, PartialEq)]
pub struct Appended {
    pub name: String,
    pub samples: u32,
    pub aggregate: Aggregate,
    pub mean: Option<f64>,
}

/// Protocol double recording every frame it sends
#[derive(Debug)]
pub struct RecordingProtocol {
    pub connected: bool,
    pub ready: bool,
    pub allowed: bool,
    pub fail_init: bool,
    /// Appends accepted per frame, consumed one per `init`; unlimited once empty
    pub capacities: VecDeque<usize>,
    capacity: Option<usize>,
    pub current: Vec<Appended>,
    pub frames: Vec<Vec<Appended>>,
    pub inits: u32,
    pub resets: u32,
}

impl RecordingProtocol {
    pub fn online() -> Self {
        Self {
            connected: true,
            ready: true,
            allowed: true,
            fail_init: false,
            capacities: VecDeque::new(),
            capacity: None,
            current: Vec::new(),
            frames: Vec::new(),
            inits: 0,
            resets: 0,
        }
    }

    pub fn with_capacities(mut self, capacities: &[usize]) -> Self {
        self.capacities = capacities.iter().copied().collect();
        self
    }

    pub fn frame_names(&self) -> Vec<Vec<String>> {
        self.frames.iter().map(|f| f.iter().map(|a| a.name.clone()).collect()).collect()
    }
}

impl Protocol for RecordingProtocol {
    fn init(&mut self) -> ProtocolResult<()> {
        self.inits += 1;
        if self.fail_init {
            return Err(ProtocolError::InitFailed);
        }
        self.current.clear();
        self.capacity = self.capacities.pop_front();
        Ok(())
    }

    fn append(&mut self, def: &MeasurementDefinition, acc: &MeasurementAccumulator) -> ProtocolResult<()> {
        if self.capacity.is_some_and(|c| self.current.len() >= c) {
            return Err(ProtocolError::BufferFull);
        }
        self.current.push(Appended {
            name: def.name().to_string(),
            samples: acc.samples_taken(),
            aggregate: acc.aggregate().clone(),
            mean: acc.mean(),
        });
        Ok(())
    }

    fn send(&mut self) -> ProtocolResult<()> {
        self.frames.push(std::mem::take(&mut self.current));
        Ok(())
    }

    fn send_ready(&self) -> bool {
        self.ready
    }

    fn send_allowed(&self) -> bool {
        self.allowed
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.current.clear();
    }
}

// ===== PLATFORM =====

/// Board double; sleeping and busy-waiting move the shared clock
pub struct SimBoard<'a> {
    clock: &'a FixedTime,
    pub on_battery: Option<bool>,
    pub naps: Vec<u32>,
    pub spin_step_ms: u64,
}

impl<'a> SimBoard<'a> {
    pub fn new(clock: &'a FixedTime) -> Self {
        Self { clock, on_battery: None, naps: Vec::new(), spin_step_ms: 1 }
    }

    pub fn on_battery(mut self) -> Self {
        self.on_battery = Some(true);
        self
    }
}

impl Platform for SimBoard<'_> {
    fn on_battery(&mut self) -> Option<bool> {
        self.on_battery
    }

    fn sleep_for(&mut self, ms: u32) -> bool {
        self.naps.push(ms);
        self.clock.advance(ms as u64);
        true
    }

    fn tight_loop(&mut self) {
        self.clock.advance(self.spin_step_ms);
    }
}

// ===== DRIVER =====

pub type TestNode<'a> = SensorNode<ScriptedSensors<'a>, RecordingProtocol, SimBoard<'a>, &'a FixedTime, 8>;

/// Node with a one second transmit tick
pub fn node_with<'a>(
    clock: &'a FixedTime,
    sensors: ScriptedSensors<'a>,
    protocol: RecordingProtocol,
) -> TestNode<'a> {
    let config = NodeConfig::new().with_transmit_interval_ms(1000).with_power_mode(PowerMode::Plugged);
    SensorNode::new(config, sensors, protocol, SimBoard::new(clock), clock)
}

/// Integer definition with the given period and sample count
pub fn def(name: &str, period: u8, samplecount: u8) -> MeasurementDefinition {
    MeasurementDefinition::new(name, MeasurementKind::Custom0, period, samplecount).unwrap()
}

/// Iterate every `step_ms` until the clock reaches `until`, collecting
/// every pipeline outcome.
pub fn run_until<S, P, H>(
    node: &mut SensorNode<S, P, H, &FixedTime, 8>,
    clock: &FixedTime,
    until: Timestamp,
    step_ms: u64,
) -> Vec<SendOutcome>
where
    S: SensorInterface,
    P: Protocol,
    H: Platform,
{
    let mut outcomes = Vec::new();
    while clock.now() <= until {
        if let Iteration::Ran { send: Some(outcome), .. } = node.iterate() {
            outcomes.push(outcome);
        }
        clock.advance(step_ms);
    }
    outcomes
}
