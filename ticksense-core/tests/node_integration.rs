//! Integration tests for the node driver
//!
//! Covers the paths around the periodic cycle: instant sends, one-shot
//! reads, sleeping, boot loading and the interrupt-fed pulse counter.

mod common;

use common::{
    def, node_with, run_until, Channel, RecordingProtocol, ScriptedSensors, SensorEvent, SimBoard,
};
use ticksense_core::prelude::*;
use ticksense_core::BootSource;

fn minute_config() -> NodeConfig {
    NodeConfig::new()
        .with_transmit_interval_ms(60_000)
        .with_power_mode(PowerMode::Plugged)
}

// ===== INSTANT SEND =====

#[test]
fn instant_send_goes_out_in_its_own_frame() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[77]));
    let mut node: common::TestNode =
        SensorNode::new(minute_config(), sensors, RecordingProtocol::online(), SimBoard::new(&clock), &clock);
    node.add(def("A", 1, 1)).unwrap();

    clock.set(1000);
    node.request_instant_send("A").unwrap();
    node.iterate();

    let frames = &node.protocol().frames;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0][0].aggregate, Aggregate::Integer { sum: 77, min: 77, max: 77 });

    let acc = node.registry().accumulator("A").unwrap();
    assert!(!acc.instant_send_requested());
    assert_eq!(acc.samples_taken(), 0);
    assert!(node
        .sensors()
        .events
        .iter()
        .any(|e| matches!(e, SensorEvent::Start { isolated: true, .. })));
}

#[test]
fn instant_send_waits_out_imminent_scheduled_send() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[]));
    let mut node: common::TestNode =
        SensorNode::new(minute_config(), sensors, RecordingProtocol::online(), SimBoard::new(&clock), &clock);
    node.add(def("A", 0, 1)).unwrap();

    clock.set(50_000);
    node.request_instant_send("A").unwrap();
    node.iterate();
    assert!(node.protocol().frames.is_empty());
    assert!(node.registry().accumulator("A").unwrap().instant_send_requested());

    // Next tick starts when the scheduled send runs; the request follows it
    run_until(&mut node, &clock, 60_010, 10);
    node.iterate();
    assert_eq!(node.protocol().frames.len(), 1);
    assert!(!node.registry().accumulator("A").unwrap().instant_send_requested());
}

#[test]
fn instant_send_refused_mid_fragment() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock)
        .with(Channel::integer("A", &[]))
        .with(Channel::integer("B", &[]));
    let protocol = RecordingProtocol::online().with_capacities(&[1]);
    let mut node: common::TestNode =
        SensorNode::new(minute_config(), sensors, protocol, SimBoard::new(&clock), &clock);
    node.add(def("A", 1, 1)).unwrap();
    node.add(def("B", 1, 1)).unwrap();

    let outcomes = run_until(&mut node, &clock, 60_010, 10);
    assert_eq!(outcomes, vec![SendOutcome::Fragment { queued: 1 }]);

    node.request_instant_send("A").unwrap();
    node.iterate();
    assert_eq!(node.protocol().frames.len(), 1);
    assert!(node.registry().accumulator("A").unwrap().instant_send_requested());
}

#[test]
fn send_test_reports_link_state() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[5]));
    let mut node = node_with(&clock, sensors, RecordingProtocol::online());
    node.add(def("A", 1, 1)).unwrap();

    node.protocol_mut().connected = false;
    assert_eq!(node.send_test("A"), Err(SendError::NotConnected));

    node.protocol_mut().connected = true;
    assert_eq!(node.send_test("A"), Ok(()));
    assert_eq!(node.protocol().frames[0][0].aggregate, Aggregate::Integer { sum: 5, min: 5, max: 5 });

    assert_eq!(
        node.send_test("ZZ"),
        Err(SendError::Read(ReadError::Config(ConfigError::UnknownMeasurement)))
    );
}

// ===== ONE-SHOT READS =====

#[test]
fn get_reading_spins_until_sensor_is_ready() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock)
        .with(Channel::float("TMP", &[19.25]).with_collection_time(50).with_polls(5));
    let mut node = node_with(&clock, sensors, RecordingProtocol::online());
    node.add(def("TMP", 1, 1)).unwrap();

    assert_eq!(node.get_reading("TMP"), Ok(Reading::Float(19.25)));
    assert!(clock.now() >= 5);
    assert!(!node.registry().accumulator("TMP").unwrap().is_acquiring());
}

#[test]
fn get_reading_times_out() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[]).with_polls(1000));
    let mut node = node_with(&clock, sensors, RecordingProtocol::online());
    node.add(def("A", 1, 1)).unwrap();

    assert_eq!(node.get_reading_with_timeout("A", 20), Err(ReadError::TimedOut));
    assert!(clock.now() >= 20);
    assert!(!node.registry().accumulator("A").unwrap().is_acquiring());
}

#[test]
fn get_reading_powers_disabled_sensor_temporarily() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[3]));
    let mut node = node_with(&clock, sensors, RecordingProtocol::online());
    node.add(def("A", 0, 1)).unwrap();
    node.sensors_mut().events.clear();

    assert_eq!(node.get_reading("A"), Ok(Reading::Integer(3)));

    let enables: Vec<bool> = node
        .sensors()
        .events
        .iter()
        .filter_map(|e| match e {
            SensorEvent::Enable { on, .. } => Some(*on),
            _ => None,
        })
        .collect();
    assert_eq!(enables, vec![true, false]);
    assert!(!node.sensors().channel("A").enabled);
}

// ===== SLEEP =====

#[test]
fn battery_node_naps_until_next_sample() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[]));
    let config = NodeConfig::new().with_transmit_interval_ms(60_000).with_power_mode(PowerMode::Battery);
    let mut node: common::TestNode =
        SensorNode::new(config, sensors, RecordingProtocol::online(), SimBoard::new(&clock), &clock);
    node.add(def("A", 1, 1)).unwrap();

    assert_eq!(node.iterate(), Iteration::Ran { send: None, sleep: Some(SleepDecision::SampleDue) });

    clock.set(10);
    assert_eq!(
        node.iterate(),
        Iteration::Ran { send: None, sleep: Some(SleepDecision::Slept { ms: 28_990, entered: true }) }
    );
    assert_eq!(clock.now(), 29_000);
    assert_eq!(node.platform().naps, vec![28_990]);
}

#[test]
fn no_nap_while_acquiring() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock)
        .with(Channel::integer("A", &[]).with_collection_time(100).with_polls(100));
    let config = NodeConfig::new().with_transmit_interval_ms(1000).with_power_mode(PowerMode::Battery);
    let mut node: common::TestNode =
        SensorNode::new(config, sensors, RecordingProtocol::online(), SimBoard::new(&clock), &clock);
    node.add(def("A", 1, 1)).unwrap();

    clock.set(450);
    node.iterate();
    assert!(node.registry().accumulator("A").unwrap().is_acquiring());
    assert_eq!(node.iterate(), Iteration::Ran { send: None, sleep: None });
    assert!(node.platform().naps.is_empty());
}

#[test]
fn auto_mode_needs_battery_probe() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[]));
    let config = NodeConfig::new().with_transmit_interval_ms(60_000);
    let mut node: common::TestNode =
        SensorNode::new(config, sensors, RecordingProtocol::online(), SimBoard::new(&clock), &clock);
    node.add(def("A", 1, 1)).unwrap();

    clock.set(10);
    assert_eq!(node.iterate(), Iteration::Ran { send: None, sleep: Some(SleepDecision::PowerPolicy) });

    node.platform_mut().on_battery = Some(true);
    clock.set(20);
    assert!(matches!(
        node.iterate(),
        Iteration::Ran { sleep: Some(SleepDecision::Slept { .. }), .. }
    ));

    node.set_power_mode(PowerMode::Plugged);
    assert_eq!(node.governor().power_mode(), PowerMode::Plugged);
}

// ===== CONFIGURATION =====

#[test]
fn boot_falls_back_to_defaults() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock)
        .with(Channel::integer("A", &[]))
        .with(Channel::integer("B", &[]));
    let mut node = node_with(&clock, sensors, RecordingProtocol::online());

    let defaults = [def("A", 1, 1), def("B", 5, 2)];
    assert_eq!(node.load(&[], &defaults), BootSource::Defaults);
    assert_eq!(node.registry().len(), 2);
    assert_eq!(node.period("B"), Ok(5));
    assert!(node.sensors().channel("A").enabled);
}

#[test]
fn boot_prefers_persisted_table() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock)
        .with(Channel::integer("A", &[]))
        .with(Channel::integer("B", &[]));
    let mut node = node_with(&clock, sensors, RecordingProtocol::online());

    let persisted = [def("B", 2, 1)];
    let defaults = [def("A", 1, 1), def("B", 5, 2)];
    assert_eq!(node.load(&persisted, &defaults), BootSource::Persisted);
    assert_eq!(node.registry().len(), 1);
    assert_eq!(node.samplecount("B"), Ok(1));
}

#[test]
fn registry_edits_through_node() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[]));
    let mut node = node_with(&clock, sensors, RecordingProtocol::online());
    node.add(def("A", 1, 1)).unwrap();

    assert_eq!(node.add(def("A", 1, 1)), Err(ConfigError::DuplicateName));
    assert_eq!(node.add(def("NOPE", 1, 1)), Err(ConfigError::UnsupportedKind));
    assert_eq!(node.set_samplecount("A", 0), Err(ConfigError::InvalidSampleCount));

    node.set_period("A", 0).unwrap();
    assert!(!node.sensors().channel("A").enabled);
    node.set_period("A", 3).unwrap();
    assert!(node.sensors().channel("A").enabled);

    node.set_immediate("A", true).unwrap();
    assert_eq!(node.is_immediate("A"), Ok(true));

    let mut seen = Vec::new();
    node.for_each(|d| {
        seen.push(d.name().to_string());
        true
    });
    assert_eq!(seen, vec!["A"]);

    node.remove("A").unwrap();
    assert!(node.registry().is_empty());
    assert!(!node.sensors().channel("A").enabled);
}

#[test]
fn disabling_stops_the_loop_and_reenabling_restarts_tick() {
    let clock = FixedTime::new(0);
    let sensors = ScriptedSensors::new(&clock).with(Channel::integer("A", &[]));
    let mut node = node_with(&clock, sensors, RecordingProtocol::online());
    node.add(def("A", 1, 1)).unwrap();

    node.set_enabled(false);
    run_until(&mut node, &clock, 3000, 10);
    assert!(node.sensors().starts("A").is_empty());
    assert!(node.protocol().frames.is_empty());

    node.set_enabled(true);
    assert_eq!(node.cycle().last_sent(), clock.now());
}

// ===== PULSE COUNTER =====

#[test]
fn pulse_counter_keeps_pulses_arriving_before_ack() {
    let clock = FixedTime::new(0);
    let counter = PulseCounter::new();
    let config = NodeConfig::new().with_transmit_interval_ms(1000).with_power_mode(PowerMode::Plugged);
    let mut node: SensorNode<&PulseCounter, RecordingProtocol, SimBoard, &FixedTime, 8> =
        SensorNode::new(config, &counter, RecordingProtocol::online(), SimBoard::new(&clock), &clock);
    let pc = MeasurementDefinition::new("PC1", MeasurementKind::PulseCount, 1, 1).unwrap();
    node.add(pc).unwrap();
    assert!(counter.is_counting());

    for _ in 0..5 {
        counter.record_pulse();
    }
    run_until(&mut node, &clock, 600, 10);
    for _ in 0..3 {
        counter.record_pulse();
    }
    run_until(&mut node, &clock, 1010, 10);

    assert_eq!(node.protocol().frames[0][0].aggregate, Aggregate::Integer { sum: 5, min: 5, max: 5 });
    assert_eq!(counter.count(), 8);

    node.on_ack(true);
    assert_eq!(counter.count(), 3);
}
