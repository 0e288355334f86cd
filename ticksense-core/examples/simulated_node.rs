//! Simulated Sensor Node Example
//!
//! Runs the tick loop against a simulated clock: a temperature probe
//! sampled four times per tick, a pulse counter fed by a fake interrupt,
//! and a console "radio" that prints each frame and acknowledges it.
//!
//! ## What You'll Learn
//!
//! - Implementing `SensorInterface` for a board's sensors
//! - Sharing a `PulseCounter` between an interrupt and the node
//! - Letting the sleep governor drive a simulated clock
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example simulated_node
//! ```

use ticksense_core::prelude::*;

/// Board sensors: a slowly warming probe plus the pulse counter.
struct BoardSensors<'a> {
    pulses: &'a PulseCounter,
    temperature: f32,
}

impl SensorInterface for BoardSensors<'_> {
    fn value_kind(&self, def: &MeasurementDefinition) -> Option<ValueKind> {
        match def.kind {
            MeasurementKind::W1Probe => Some(ValueKind::Float),
            _ => self.pulses.value_kind(def),
        }
    }

    fn collection_time(&mut self, def: &MeasurementDefinition) -> Option<SensorResult<u32>> {
        match def.kind {
            // One-wire conversion time at 12 bit resolution
            MeasurementKind::W1Probe => Some(Ok(750)),
            _ => self.pulses.collection_time(def),
        }
    }

    fn start(&mut self, def: &MeasurementDefinition, isolated: bool) -> SensorResult<()> {
        match def.kind {
            MeasurementKind::W1Probe => Ok(()),
            _ => self.pulses.start(def, isolated),
        }
    }

    fn collect(&mut self, def: &MeasurementDefinition) -> SensorResult<Reading> {
        match def.kind {
            MeasurementKind::W1Probe => {
                self.temperature += 0.25;
                Ok(Reading::Float(self.temperature))
            }
            _ => self.pulses.collect(def),
        }
    }

    fn enable(&mut self, def: &MeasurementDefinition, enabled: bool) {
        if def.kind == MeasurementKind::PulseCount {
            self.pulses.enable(def, enabled);
        }
    }

    fn acked(&mut self, def: &MeasurementDefinition) {
        if def.kind == MeasurementKind::PulseCount {
            self.pulses.acked(def);
        }
    }
}

/// Prints frames instead of transmitting them.
#[derive(Default)]
struct ConsoleRadio {
    line: String,
    frames: u32,
}

impl Protocol for ConsoleRadio {
    fn init(&mut self) -> ProtocolResult<()> {
        self.line.clear();
        Ok(())
    }

    fn append(&mut self, def: &MeasurementDefinition, acc: &MeasurementAccumulator) -> ProtocolResult<()> {
        let value = match acc.aggregate() {
            Aggregate::Integer { sum, .. } => format!("{}", sum),
            Aggregate::Float { min, max, .. } => {
                format!("{:.2} ({:.2}..{:.2})", acc.mean().unwrap_or_default(), min, max)
            }
            Aggregate::Text(s) => format!("\"{}\"", s),
            Aggregate::Empty => return Err(ProtocolError::SendFailed),
        };
        self.line.push_str(&format!(" {}={}", def.name(), value));
        Ok(())
    }

    fn send(&mut self) -> ProtocolResult<()> {
        self.frames += 1;
        println!("  uplink #{}:{}", self.frames, self.line);
        Ok(())
    }

    fn send_ready(&self) -> bool {
        true
    }

    fn is_connected(&self) -> bool {
        true
    }
}

/// Sleeping just moves the simulated clock forward.
struct SimulatedBoard<'a> {
    clock: &'a FixedTime,
    slept_ms: u64,
}

impl Platform for SimulatedBoard<'_> {
    fn on_battery(&mut self) -> Option<bool> {
        Some(true)
    }

    fn sleep_for(&mut self, ms: u32) -> bool {
        self.clock.advance(ms as u64);
        self.slept_ms += ms as u64;
        true
    }
}

fn main() {
    println!("TickSense Simulated Node Example");
    println!("================================\n");

    let clock = FixedTime::new(0);
    let pulses = PulseCounter::new();
    let sensors = BoardSensors { pulses: &pulses, temperature: 18.0 };
    let board = SimulatedBoard { clock: &clock, slept_ms: 0 };

    let config = NodeConfig::new().with_transmit_interval_ms(60_000);
    let mut node: SensorNode<_, _, _, _> =
        SensorNode::new(config, sensors, ConsoleRadio::default(), board, &clock);

    let defaults = [
        MeasurementDefinition::new("TMP", MeasurementKind::W1Probe, 1, 4).unwrap(),
        MeasurementDefinition::new("PC1", MeasurementKind::PulseCount, 1, 1).unwrap(),
    ];
    let source = node.load(&[], &defaults);
    println!("Loaded {} measurements from {:?}\n", node.registry().len(), source);

    let mut frames_acked = 0;
    while clock.now() < 3 * 60_000 + 1_000 {
        // A pulse roughly every 7 seconds of simulated time
        if clock.now() % 7_000 < 100 {
            pulses.record_pulse();
        }

        node.iterate();
        if node.protocol().frames > frames_acked {
            frames_acked = node.protocol().frames;
            node.on_ack(true);
        }
        clock.advance(100);
    }

    let sched = node.scheduler_stats();
    let pipe = node.pipeline_stats();
    println!("\nScheduler: {} starts, {} collects, {} errors", sched.starts, sched.collects, sched.sensor_errors);
    println!("Pipeline:  {} sends, {} acks", pipe.complete_sends, pipe.acks);
    println!("Slept {:.1}s of {:.1}s", node.platform().slept_ms as f64 / 1000.0, clock.now() as f64 / 1000.0);
    println!("Pulses waiting for next uplink: {}", pulses.count());
}
