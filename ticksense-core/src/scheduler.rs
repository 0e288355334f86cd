//! Measurement Scheduler
//!
//! Decides, once per tick, which measurements must start an acquisition
//! and which must collect one, then returns how long the node may wait
//! before the next deadline.
//!
//! ## Phase Model
//!
//! Each measurement has its own period of `period` transmit ticks, split
//! into `samplecount` equal slices. Samples are centred in their slice:
//!
//! ```text
//!   period * T
//!   |<------------------------------------------------>|
//!   |  slice 0      |  slice 1      |  slice 2      |
//!   |-------^-------|-------^-------|-------^-------|
//!        target 0        target 1        target 2
//!
//!   start  = target - collection_time
//!   collect = target
//! ```
//!
//! "Now" is folded into the period as
//! `position = elapsed_in_tick + (cycle_count % period) * T`.
//!
//! An immediate single-sample measurement targets the end of its slice
//! minus a guard band instead of the centre, so the value is fresh when
//! the send happens.
//!
//! ## Counters
//!
//! `acquisitions_started` and `acquisitions_finished` index the next start
//! and collect targets. When a new start comes due while the previous
//! acquisition is still uncollected, that acquisition is abandoned. If the
//! counters drift further apart the scheduler logs a desync and snaps
//! `finished` to `started`.

use crate::accumulator::MeasurementAccumulator;
use crate::cycle::TransmitCycle;
use crate::errors::{SensorError, SensorResult};
use crate::measurement::MeasurementDefinition;
use crate::registry::MeasurementRegistry;
use crate::time::{elapsed_ms, Timestamp};
use crate::traits::sensor::{resolve_collection_time, SensorInterface};

/// Scheduler counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchedulerStats {
    /// Acquisitions started successfully
    pub starts: u32,
    /// Readings collected successfully
    pub collects: u32,
    /// Failed starts, polls and collects
    pub sensor_errors: u32,
    /// Busy responses that forced an immediate retry
    pub busy_retries: u32,
    /// Counter desyncs corrected
    pub desyncs: u32,
}

impl SchedulerStats {
    /// All counters zero
    pub const fn new() -> Self {
        Self { starts: 0, collects: 0, sensor_errors: 0, busy_retries: 0, desyncs: 0 }
    }
}

/// Per-tick acquisition scheduler
#[derive(Debug, Clone)]
pub struct Scheduler {
    immediate_guard_ms: u32,
    default_collection_time_ms: u32,
    last_checked: Timestamp,
    wait_time: u64,
    stats: SchedulerStats,
}

impl Scheduler {
    /// New scheduler. It runs on the first tick.
    pub const fn new(immediate_guard_ms: u32, default_collection_time_ms: u32) -> Self {
        Self {
            immediate_guard_ms,
            default_collection_time_ms,
            last_checked: 0,
            wait_time: 0,
            stats: SchedulerStats::new(),
        }
    }

    /// Wait returned by the last tick (milliseconds)
    pub fn wait_time(&self) -> u64 {
        self.wait_time
    }

    /// When the last tick ran
    pub fn last_checked(&self) -> Timestamp {
        self.last_checked
    }

    /// Whether the wait from the last tick has run out.
    #[inline]
    pub fn is_due(&self, now: Timestamp) -> bool {
        elapsed_ms(self.last_checked, now) > self.wait_time
    }

    /// Time until the next deadline found by the last tick, zero if passed.
    pub fn time_to_next(&self, now: Timestamp) -> u64 {
        self.wait_time.saturating_sub(elapsed_ms(self.last_checked, now))
    }

    /// Counters
    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    /// Run one scheduling pass over every active measurement.
    ///
    /// Returns the time until the nearest start or collect deadline. A busy
    /// sensor forces zero; an empty table also yields zero.
    pub fn tick<S, const N: usize>(
        &mut self,
        registry: &mut MeasurementRegistry<N>,
        sensors: &mut S,
        cycle: &TransmitCycle,
        now: Timestamp,
    ) -> u64
    where
        S: SensorInterface + ?Sized,
    {
        self.last_checked = now;
        let mut nearest: Option<u64> = None;

        for entry in registry.entries_mut() {
            if !entry.def.is_active() {
                continue;
            }
            let wait = self.schedule_one(&entry.def, &mut entry.acc, sensors, cycle, now);
            nearest = Some(nearest.map_or(wait, |n| n.min(wait)));
        }

        self.wait_time = nearest.unwrap_or(0);
        self.wait_time
    }

    fn schedule_one<S>(
        &mut self,
        def: &MeasurementDefinition,
        acc: &mut MeasurementAccumulator,
        sensors: &mut S,
        cycle: &TransmitCycle,
        now: Timestamp,
    ) -> u64
    where
        S: SensorInterface + ?Sized,
    {
        let interval = cycle.interval_ms() as u64;
        let period = def.period as u64;
        let spacing = period * interval / def.samplecount as u64;
        let position = cycle.elapsed(now) + (cycle.count() % def.period as u32) as u64 * interval;

        let lead = if def.effective_immediate() {
            spacing.saturating_sub(self.immediate_guard_ms as u64)
        } else {
            spacing / 2
        };
        let target = |n: u32| n as u64 * spacing + lead;

        let start_target = target(acc.acquisitions_started);
        if start_target < acc.collection_time_estimate as u64 {
            acc.collection_time_estimate = start_target as u32;
        }
        let start_at = start_target - acc.collection_time_estimate as u64;
        let collect_at = target(acc.acquisitions_finished);

        let start_wait = if position >= start_at {
            if acc.acquisitions_finished < acc.acquisitions_started {
                meas_debug!("{} could not collect before next start", def.name());
                acc.acquisitions_finished += 1;
                acc.is_acquiring = false;
            }
            match self.start(def, acc, sensors) {
                Err(nb::Error::WouldBlock) => 0,
                _ => start_target.saturating_sub(position),
            }
        } else {
            start_at - position
        };

        let collect_wait = if acc.acquisitions_finished == acc.acquisitions_started {
            None
        } else if acc.acquisitions_finished + 1 == acc.acquisitions_started {
            if position >= collect_at {
                match self.collect(def, acc, sensors) {
                    Err(nb::Error::WouldBlock) => Some(0),
                    _ => Some(
                        (collect_at + spacing)
                            .saturating_sub(acc.collection_time_estimate as u64 + position),
                    ),
                }
            } else {
                Some(collect_at - position)
            }
        } else {
            meas_error!("Collect and start fell out of sync for {}, skipping collects.", def.name());
            self.stats.desyncs = self.stats.desyncs.wrapping_add(1);
            acc.acquisitions_finished = acc.acquisitions_started;
            acc.is_acquiring = false;
            None
        };

        match collect_wait {
            Some(w) => start_wait.min(w),
            None => start_wait,
        }
    }

    /// Ask the sensor to begin an acquisition and step the counters.
    fn start<S>(
        &mut self,
        def: &MeasurementDefinition,
        acc: &mut MeasurementAccumulator,
        sensors: &mut S,
    ) -> SensorResult<()>
    where
        S: SensorInterface + ?Sized,
    {
        if acc.is_acquiring {
            meas_debug!("Measurement {} already collecting.", def.name());
            acc.acquisitions_started += 1;
            acc.acquisitions_finished += 1;
            self.stats.sensor_errors = self.stats.sensor_errors.wrapping_add(1);
            return Err(nb::Error::Other(SensorError::AlreadyCollecting));
        }

        let result = sensors.start(def, false);
        match &result {
            Ok(()) => {
                meas_debug!("{} successfully started.", def.name());
                acc.acquisitions_started += 1;
                acc.is_acquiring = true;
                self.stats.starts = self.stats.starts.wrapping_add(1);
            }
            Err(nb::Error::Other(_e)) => {
                meas_debug!("{} could not start, will not collect: {}", def.name(), _e);
                acc.acquisitions_started += 1;
                acc.acquisitions_finished += 1;
                self.stats.sensor_errors = self.stats.sensor_errors.wrapping_add(1);
            }
            Err(nb::Error::WouldBlock) => {
                self.stats.busy_retries = self.stats.busy_retries.wrapping_add(1);
            }
        }
        result
    }

    /// Collect the in-flight acquisition and fold the reading.
    fn collect<S>(
        &mut self,
        def: &MeasurementDefinition,
        acc: &mut MeasurementAccumulator,
        sensors: &mut S,
    ) -> SensorResult<()>
    where
        S: SensorInterface + ?Sized,
    {
        let result = sensors.collect(def);
        acc.is_acquiring = false;
        match result {
            Ok(reading) => {
                meas_debug!("{} successfully collected.", def.name());
                acc.acquisitions_finished += 1;
                acc.fold(&reading);
                acc.collection_time_estimate =
                    resolve_collection_time(sensors, def, self.default_collection_time_ms);
                self.stats.collects = self.stats.collects.wrapping_add(1);
                Ok(())
            }
            Err(nb::Error::Other(e)) => {
                meas_debug!("{} could not collect: {}", def.name(), e);
                acc.acquisitions_finished += 1;
                self.stats.sensor_errors = self.stats.sensor_errors.wrapping_add(1);
                Err(nb::Error::Other(e))
            }
            Err(nb::Error::WouldBlock) => {
                self.stats.busy_retries = self.stats.busy_retries.wrapping_add(1);
                Err(nb::Error::WouldBlock)
            }
        }
    }

    /// Poll every in-flight acquisition. Returns how many are in flight.
    ///
    /// A failed poll abandons that acquisition.
    pub fn poll_in_flight<S, const N: usize>(
        &mut self,
        registry: &mut MeasurementRegistry<N>,
        sensors: &mut S,
    ) -> u32
    where
        S: SensorInterface + ?Sized,
    {
        let mut active = 0;
        for entry in registry.entries_mut() {
            if !entry.acc.is_in_flight() {
                continue;
            }
            active += 1;
            if let Err(nb::Error::Other(_e)) = sensors.poll(&entry.def) {
                meas_debug!("{} errored on poll, will not collect: {}", entry.def.name(), _e);
                entry.acc.acquisitions_finished = entry.acc.acquisitions_started;
                entry.acc.is_acquiring = false;
                self.stats.sensor_errors = self.stats.sensor_errors.wrapping_add(1);
            }
        }
        active
    }

    #[cfg(test)]
    pub(crate) fn set_wait_for_test(&mut self, last_checked: Timestamp, wait_time: u64) {
        self.last_checked = last_checked;
        self.wait_time = wait_time;
    }

    /// Forget the last wait so the next tick runs immediately.
    pub fn reset(&mut self, now: Timestamp) {
        self.last_checked = now;
        self.wait_time = 0;
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        use crate::constants::time::{DEFAULT_COLLECTION_TIME_MS, IMMEDIATE_GUARD_MS};
        Self::new(IMMEDIATE_GUARD_MS, DEFAULT_COLLECTION_TIME_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::{MeasurementKind, Reading, ValueKind};

    struct Counter {
        next: i64,
        start_busy: bool,
        collection_time: Option<u32>,
    }

    impl Counter {
        fn new() -> Self {
            Self { next: 1, start_busy: false, collection_time: None }
        }
    }

    impl SensorInterface for Counter {
        fn value_kind(&self, _def: &MeasurementDefinition) -> Option<ValueKind> {
            Some(ValueKind::Integer)
        }

        fn collection_time(&mut self, _def: &MeasurementDefinition) -> Option<SensorResult<u32>> {
            self.collection_time.map(Ok)
        }

        fn start(&mut self, _def: &MeasurementDefinition, _isolated: bool) -> SensorResult<()> {
            if self.start_busy {
                Err(nb::Error::WouldBlock)
            } else {
                Ok(())
            }
        }

        fn collect(&mut self, _def: &MeasurementDefinition) -> SensorResult<Reading> {
            let v = self.next;
            self.next += 1;
            Ok(Reading::Integer(v))
        }
    }

    fn setup(period: u8, samplecount: u8) -> (MeasurementRegistry<4>, Counter) {
        let mut sensors = Counter::new();
        let mut reg = MeasurementRegistry::default();
        let def = MeasurementDefinition::new("A", MeasurementKind::Custom0, period, samplecount).unwrap();
        reg.add(def, &mut sensors).unwrap();
        (reg, sensors)
    }

    #[test]
    fn waits_until_slice_centre() {
        let (mut reg, mut sensors) = setup(1, 1);
        let cycle = TransmitCycle::new(1000, 0);
        let mut sched = Scheduler::default();

        assert_eq!(sched.tick(&mut reg, &mut sensors, &cycle, 100), 400);
        assert_eq!(reg.accumulator("A").unwrap().acquisitions_started(), 0);

        sched.tick(&mut reg, &mut sensors, &cycle, 500);
        let acc = reg.accumulator("A").unwrap();
        assert_eq!(acc.acquisitions_started(), 1);
        assert_eq!(acc.acquisitions_finished(), 1);
        assert_eq!(acc.samples_taken(), 1);
        assert!(!acc.is_acquiring());
    }

    #[test]
    fn collection_time_moves_start_earlier() {
        let mut sensors = Counter { collection_time: Some(100), ..Counter::new() };
        let mut reg: MeasurementRegistry<4> = MeasurementRegistry::default();
        let def = MeasurementDefinition::new("A", MeasurementKind::Custom0, 1, 1).unwrap();
        reg.add(def, &mut sensors).unwrap();

        let cycle = TransmitCycle::new(1000, 0);
        let mut sched = Scheduler::default();

        assert_eq!(sched.tick(&mut reg, &mut sensors, &cycle, 0), 400);
        let wait = sched.tick(&mut reg, &mut sensors, &cycle, 400);
        assert_eq!(reg.accumulator("A").unwrap().acquisitions_started(), 1);
        assert!(reg.accumulator("A").unwrap().is_acquiring());
        assert_eq!(wait, 100);

        sched.tick(&mut reg, &mut sensors, &cycle, 500);
        assert_eq!(reg.accumulator("A").unwrap().samples_taken(), 1);
    }

    #[test]
    fn busy_start_forces_zero_wait() {
        let (mut reg, mut sensors) = setup(1, 1);
        sensors.start_busy = true;
        let cycle = TransmitCycle::new(1000, 0);
        let mut sched = Scheduler::default();

        assert_eq!(sched.tick(&mut reg, &mut sensors, &cycle, 600), 0);
        assert_eq!(reg.accumulator("A").unwrap().acquisitions_started(), 0);
        assert_eq!(sched.stats().busy_retries, 1);
    }

    #[test]
    fn immediate_samples_before_period_end() {
        let mut sensors = Counter::new();
        let mut reg: MeasurementRegistry<4> = MeasurementRegistry::default();
        let def = MeasurementDefinition::new("B", MeasurementKind::BatteryMonitor, 1, 1)
            .unwrap()
            .with_immediate(true);
        reg.add(def, &mut sensors).unwrap();

        let cycle = TransmitCycle::new(1000, 0);
        let mut sched = Scheduler::default();
        assert_eq!(sched.tick(&mut reg, &mut sensors, &cycle, 0), 990);
        sched.tick(&mut reg, &mut sensors, &cycle, 989);
        assert_eq!(reg.accumulator("B").unwrap().samples_taken(), 0);
        sched.tick(&mut reg, &mut sensors, &cycle, 990);
        assert_eq!(reg.accumulator("B").unwrap().samples_taken(), 1);
    }

    #[test]
    fn period_position_folds_cycle_count() {
        let (mut reg, mut sensors) = setup(2, 2);
        let mut cycle = TransmitCycle::new(1000, 0);
        let mut sched = Scheduler::default();

        // spacing 1000, targets at 500 and 1500 of the two-tick period
        sched.tick(&mut reg, &mut sensors, &cycle, 500);
        assert_eq!(reg.accumulator("A").unwrap().samples_taken(), 1);

        cycle.advance();
        cycle.restart(1000);
        assert_eq!(sched.tick(&mut reg, &mut sensors, &cycle, 1200), 300);
        sched.tick(&mut reg, &mut sensors, &cycle, 1500);
        assert_eq!(reg.accumulator("A").unwrap().samples_taken(), 2);
    }

    #[test]
    fn desync_is_corrected() {
        let (mut reg, mut sensors) = setup(1, 4);
        {
            let entry = reg.entry_mut("A").unwrap();
            entry.acc.acquisitions_started = 3;
            entry.acc.acquisitions_finished = 0;
        }
        let cycle = TransmitCycle::new(1000, 0);
        let mut sched = Scheduler::default();
        sched.tick(&mut reg, &mut sensors, &cycle, 0);

        let acc = reg.accumulator("A").unwrap();
        assert_eq!(acc.acquisitions_finished(), acc.acquisitions_started());
        assert_eq!(sched.stats().desyncs, 1);
    }

    #[test]
    fn empty_table_waits_zero() {
        let mut sensors = Counter::new();
        let mut reg: MeasurementRegistry<4> = MeasurementRegistry::default();
        let cycle = TransmitCycle::new(1000, 0);
        let mut sched = Scheduler::default();
        assert_eq!(sched.tick(&mut reg, &mut sensors, &cycle, 10), 0);
    }

    #[test]
    fn disabled_definition_never_started() {
        let (mut reg, mut sensors) = setup(0, 1);
        let cycle = TransmitCycle::new(1000, 0);
        let mut sched = Scheduler::default();
        for t in (0..3000).step_by(100) {
            sched.tick(&mut reg, &mut sensors, &cycle, t);
        }
        assert_eq!(reg.accumulator("A").unwrap().acquisitions_started(), 0);
        assert_eq!(sched.stats().starts, 0);
    }
}
