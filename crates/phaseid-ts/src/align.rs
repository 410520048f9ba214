//! Nearest-neighbour alignment of two irregularly sampled voltage series.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use phaseid_core::Sample;

/// A series ready for alignment: sorted by timestamp, only finite voltages.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanSeries {
    timestamps: Vec<DateTime<Utc>>,
    voltages: Vec<f64>,
    dropped: usize,
}

impl CleanSeries {
    /// Sort (stable) and drop samples whose voltage is missing or non-finite.
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut usable: Vec<(DateTime<Utc>, f64)> = samples
            .iter()
            .filter_map(|s| s.usable_voltage().map(|v| (s.timestamp, v)))
            .collect();
        usable.sort_by_key(|(ts, _)| *ts);
        let dropped = samples.len() - usable.len();
        let (timestamps, voltages) = usable.into_iter().unzip();
        Self {
            timestamps,
            voltages,
            dropped,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Samples removed by cleaning.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn voltages(&self) -> &[f64] {
        &self.voltages
    }

    /// Index of the sample closest to `at`. Equal distances resolve to the
    /// earlier sample, and duplicated timestamps to their first occurrence.
    fn nearest(&self, at: DateTime<Utc>) -> Option<usize> {
        let next = self.timestamps.partition_point(|ts| *ts < at);
        let chosen = match (next.checked_sub(1), self.timestamps.get(next)) {
            (None, None) => return None,
            (None, Some(_)) => next,
            (Some(prev), None) => prev,
            (Some(prev), Some(next_ts)) => {
                let before = at - self.timestamps[prev];
                let after = *next_ts - at;
                if before <= after {
                    prev
                } else {
                    next
                }
            }
        };
        let ts = self.timestamps[chosen];
        Some(self.timestamps.partition_point(|t| *t < ts))
    }
}

/// One customer sample paired with its nearest feeder sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub customer_time: DateTime<Utc>,
    pub feeder_time: DateTime<Utc>,
    pub customer_voltage: f64,
    pub feeder_voltage: f64,
}

impl AlignedPair {
    /// Absolute timestamp distance between the two samples.
    pub fn offset(&self) -> TimeDelta {
        (self.customer_time - self.feeder_time).abs()
    }
}

/// Pair every customer sample with the nearest feeder sample whose offset is
/// within `tolerance` (inclusive). Several customer samples may share one
/// feeder sample.
pub fn align(customer: &CleanSeries, feeder: &CleanSeries, tolerance: TimeDelta) -> Vec<AlignedPair> {
    let mut pairs = Vec::with_capacity(customer.len());
    for (&customer_time, &customer_voltage) in customer.timestamps.iter().zip(&customer.voltages) {
        let Some(idx) = feeder.nearest(customer_time) else {
            break;
        };
        let feeder_time = feeder.timestamps[idx];
        if (customer_time - feeder_time).abs() <= tolerance {
            pairs.push(AlignedPair {
                customer_time,
                feeder_time,
                customer_voltage,
                feeder_voltage: feeder.voltages[idx],
            });
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + TimeDelta::minutes(minute)
    }

    fn series(points: &[(i64, f64)]) -> CleanSeries {
        let samples: Vec<Sample> = points.iter().map(|&(m, v)| Sample::new(ts(m), v)).collect();
        CleanSeries::from_samples(&samples)
    }

    #[test]
    fn cleaning_sorts_and_drops_unusable() {
        let samples = vec![
            Sample::new(ts(30), 232.0),
            Sample::missing(ts(15)),
            Sample::new(ts(0), 230.0),
            Sample::new(ts(45), f64::INFINITY),
        ];
        let clean = CleanSeries::from_samples(&samples);
        assert_eq!(clean.timestamps(), &[ts(0), ts(30)]);
        assert_eq!(clean.voltages(), &[230.0, 232.0]);
        assert_eq!(clean.dropped(), 2);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        let feeder = series(&[(0, 230.0), (60, 231.0)]);
        let at_limit = series(&[(15, 229.0), (75, 228.0)]);
        let beyond = series(&[(16, 229.0), (76, 228.0)]);
        assert_eq!(align(&at_limit, &feeder, TimeDelta::minutes(15)).len(), 2);
        assert!(align(&beyond, &feeder, TimeDelta::minutes(15)).is_empty());
    }

    #[test]
    fn equal_distance_takes_earlier_feeder_sample() {
        let feeder = series(&[(0, 100.0), (20, 200.0)]);
        let customer = series(&[(10, 150.0)]);
        let pairs = align(&customer, &feeder, TimeDelta::minutes(15));
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].feeder_voltage, 100.0);
        assert_eq!(pairs[0].offset(), TimeDelta::minutes(10));
    }

    #[test]
    fn many_customer_samples_may_share_a_feeder_sample() {
        let feeder = series(&[(0, 230.0)]);
        let customer = series(&[(-5, 1.0), (0, 2.0), (5, 3.0)]);
        let pairs = align(&customer, &feeder, TimeDelta::minutes(15));
        assert_eq!(pairs.len(), 3);
        assert!(pairs.iter().all(|p| p.feeder_time == ts(0)));
    }

    #[test]
    fn empty_feeder_aligns_nothing() {
        let customer = series(&[(0, 230.0)]);
        assert!(align(&customer, &CleanSeries::default(), TimeDelta::minutes(15)).is_empty());
    }
}
