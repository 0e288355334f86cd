//! Per-measurement accumulation state
//!
//! One [`MeasurementAccumulator`] sits beside every definition in the
//! registry. It carries the acquisition progress counters the scheduler
//! steps through and the running aggregate the pipeline sends.
//!
//! ## Aggregation
//!
//! Numeric readings fold into `{sum, min, max}`; the first sample seeds all
//! three. Text readings replace the previous value and pin the sample count
//! to one.
//!
//! ## Counters
//!
//! `acquisitions_started` and `acquisitions_finished` count progress through
//! one period. Outside a desync window `finished <= started <= finished + 1`.

use crate::measurement::{Reading, ReadingText, ValueKind};

/// Running aggregate for one measurement
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Aggregate {
    /// Nothing folded yet
    #[default]
    Empty,
    /// Integer sum with bounds
    Integer {
        /// Sum of all folded values
        sum: i64,
        /// Smallest folded value
        min: i64,
        /// Largest folded value
        max: i64,
    },
    /// Float sum with bounds
    Float {
        /// Sum of all folded values
        sum: f32,
        /// Smallest folded value
        min: f32,
        /// Largest folded value
        max: f32,
    },
    /// Last text value
    Text(ReadingText),
}

impl Aggregate {
    fn seed(reading: &Reading) -> Self {
        match reading {
            Reading::Integer(v) => Self::Integer { sum: *v, min: *v, max: *v },
            Reading::Float(v) => Self::Float { sum: *v, min: *v, max: *v },
            Reading::Text(s) => Self::Text(s.clone()),
        }
    }

    /// Fold one more reading in. Returns false if the reading cannot be
    /// combined with the aggregate.
    fn fold(&mut self, reading: &Reading) -> bool {
        if let Self::Empty = self {
            *self = Self::seed(reading);
            return true;
        }
        match (self, reading) {
            (Self::Integer { sum, min, max }, Reading::Integer(v)) => {
                *sum = sum.wrapping_add(*v);
                widen_bounds(min, max, *v);
                true
            }
            (Self::Float { sum, min, max }, Reading::Float(v)) => {
                *sum += *v;
                widen_bounds(min, max, *v);
                true
            }
            (Self::Text(current), Reading::Text(s)) => {
                *current = s.clone();
                true
            }
            _ => false,
        }
    }
}

fn widen_bounds<T: Copy + PartialOrd>(min: &mut T, max: &mut T, v: T) {
    if v > *max {
        *max = v;
    } else if v < *min {
        *min = v;
    }
}

/// Mutable per-measurement state
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeasurementAccumulator {
    pub(crate) value_kind: ValueKind,
    pub(crate) samples_taken: u32,
    pub(crate) acquisitions_started: u32,
    pub(crate) acquisitions_finished: u32,
    pub(crate) is_acquiring: bool,
    pub(crate) collection_time_estimate: u32,
    pub(crate) aggregate: Aggregate,
    pub(crate) pending_ack: bool,
    pub(crate) instant_send_requested: bool,
}

impl MeasurementAccumulator {
    /// Fresh accumulator for a sensor of the given kind.
    pub fn new(value_kind: ValueKind, collection_time_estimate: u32) -> Self {
        Self {
            value_kind,
            collection_time_estimate,
            ..Self::default()
        }
    }

    /// Value type reported by the sensor
    pub fn value_kind(&self) -> ValueKind {
        self.value_kind
    }

    /// Samples contributing to the current aggregate
    pub fn samples_taken(&self) -> u32 {
        self.samples_taken
    }

    /// Acquisitions started this period
    pub fn acquisitions_started(&self) -> u32 {
        self.acquisitions_started
    }

    /// Acquisitions finished this period
    pub fn acquisitions_finished(&self) -> u32 {
        self.acquisitions_finished
    }

    /// An acquisition is in flight
    pub fn is_acquiring(&self) -> bool {
        self.is_acquiring
    }

    /// Last known collection time (milliseconds)
    pub fn collection_time_estimate(&self) -> u32 {
        self.collection_time_estimate
    }

    /// Current aggregate
    pub fn aggregate(&self) -> &Aggregate {
        &self.aggregate
    }

    /// Included in a batch that has not been acknowledged
    pub fn pending_ack(&self) -> bool {
        self.pending_ack
    }

    /// An out-of-band send was requested
    pub fn instant_send_requested(&self) -> bool {
        self.instant_send_requested
    }

    /// An acquisition was started and not yet collected
    #[inline]
    pub fn is_in_flight(&self) -> bool {
        self.acquisitions_started > self.acquisitions_finished
    }

    /// Arithmetic mean of the numeric aggregate.
    pub fn mean(&self) -> Option<f64> {
        if self.samples_taken == 0 {
            return None;
        }
        let n = self.samples_taken as f64;
        match self.aggregate {
            Aggregate::Integer { sum, .. } => Some(sum as f64 / n),
            Aggregate::Float { sum, .. } => Some(sum as f64 / n),
            _ => None,
        }
    }

    /// Fold a successful reading into the aggregate.
    pub fn fold(&mut self, reading: &Reading) -> bool {
        if reading.kind() != self.value_kind {
            meas_warn!("Reading kind {:?} does not match {:?}", reading.kind(), self.value_kind);
            return false;
        }
        if self.samples_taken == 0 {
            self.aggregate = Aggregate::Empty;
        }
        if !self.aggregate.fold(reading) {
            meas_warn!("Reading kind {:?} does not match aggregate", reading.kind());
            return false;
        }
        match self.aggregate {
            Aggregate::Text(_) => self.samples_taken = 1,
            _ => self.samples_taken = self.samples_taken.saturating_add(1),
        }
        match &self.aggregate {
            Aggregate::Integer { sum, min, max } => {
                meas_debug!("Sum : {}, Min : {}, Max : {}", sum, min, max);
            }
            Aggregate::Float { sum, min, max } => {
                meas_debug!("Sum : {:.3}, Min : {:.3}, Max : {:.3}", sum, min, max);
            }
            Aggregate::Text(s) => {
                meas_debug!("Value : {}", s.as_str());
            }
            Aggregate::Empty => {}
        }
        true
    }

    /// Zero the aggregate and progress counters.
    pub fn reset(&mut self) {
        self.aggregate = Aggregate::Empty;
        self.samples_taken = 0;
        self.acquisitions_started = 0;
        self.acquisitions_finished = 0;
    }

    /// Zero only the progress counters.
    pub fn reset_counters(&mut self) {
        self.acquisitions_started = 0;
        self.acquisitions_finished = 0;
    }

    /// Snapshot carrying a single instant reading.
    pub fn from_reading(reading: &Reading) -> Self {
        let mut acc = Self::new(reading.kind(), 0);
        acc.fold(reading);
        acc
    }
}
