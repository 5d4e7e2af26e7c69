//! An ordered time series of readings from a single sensor, plus the
//! observed-sample-rate diagnostic computed from its timestamp gaps.

use crate::packet_decoder::{Reading, SensorKind};

/// An append-only series of `(timestamp_us, value)` pairs for one sensor
/// kind, non-decreasing by timestamp (ties allowed). The export pipeline
/// never mutates a series; every stage derives a new sequence from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSeries {
    kind: SensorKind,
    points: Vec<(i64, i16)>,
}

impl SampleSeries {
    /// Creates an empty series for the given sensor kind.
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            points: Vec::new(),
        }
    }

    /// Builds a series from readings already ordered by timestamp, as the
    /// telemetry log delivers them. Readings of other kinds are skipped.
    pub fn from_readings(kind: SensorKind, readings: &[Reading]) -> Self {
        let points = readings
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| (r.timestamp_us, r.value))
            .collect();
        Self { kind, points }
    }

    /// Appends one observation. Timestamps are expected to be
    /// non-decreasing, but out-of-order points are kept as given; the
    /// diagnostics below tolerate them.
    pub fn push(&mut self, timestamp_us: i64, value: i16) {
        self.points.push((timestamp_us, value));
    }

    /// The sensor kind this series holds.
    pub fn kind(&self) -> SensorKind {
        self.kind
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the series holds no observations.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The ordered `(timestamp_us, value)` pairs.
    pub fn points(&self) -> &[(i64, i16)] {
        &self.points
    }

    /// Timestamp of the first observation, if any.
    pub fn first_timestamp_us(&self) -> Option<i64> {
        self.points.first().map(|&(t, _)| t)
    }

    /// Timestamp of the last observation, if any.
    pub fn last_timestamp_us(&self) -> Option<i64> {
        self.points.last().map(|&(t, _)| t)
    }

    /// Average observed sampling rate in Hz, derived from consecutive
    /// timestamp gaps. Duplicate and out-of-order timestamps produce
    /// non-positive gaps and are discarded; if nothing usable remains
    /// (including series shorter than two readings) the rate is 0.0.
    ///
    /// Diagnostic only; nothing in the pipeline feeds off this value.
    pub fn average_frequency(&self) -> f64 {
        if self.points.len() < 2 {
            return 0.0;
        }

        let positive_diffs_us: Vec<i64> = self
            .points
            .windows(2)
            .map(|w| w[1].0 - w[0].0)
            .filter(|&d| d > 0)
            .collect();

        if positive_diffs_us.is_empty() {
            return 0.0;
        }

        let sum_us: i64 = positive_diffs_us.iter().sum();
        let mean_secs = sum_us as f64 / positive_diffs_us.len() as f64 / 1_000_000.0;
        1.0 / mean_secs
    }
}
