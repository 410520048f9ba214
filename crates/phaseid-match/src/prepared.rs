//! Meter series cleaned once per batch, ahead of pairwise comparison.

use phaseid_core::{Meter, Phase};
use phaseid_ts::CleanSeries;

/// A meter whose phase series have been cleaned once, so the same feeder
/// can be compared against every customer without re-sorting.
#[derive(Debug, Clone)]
pub struct PreparedMeter<I> {
    pub id: I,
    pub series: Vec<(Phase, CleanSeries)>,
}

impl<I: Clone> PreparedMeter<I> {
    pub fn from_meter(meter: &Meter<I>) -> Self {
        Self {
            id: meter.id.clone(),
            series: meter
                .phases
                .iter()
                .map(|s| (s.phase, CleanSeries::from_samples(&s.samples)))
                .collect(),
        }
    }
}

impl<I> PreparedMeter<I> {
    /// First phase in A, B, C order.
    pub fn primary(&self) -> Option<&(Phase, CleanSeries)> {
        self.series.first()
    }

    pub fn phases(&self) -> Vec<Phase> {
        self.series.iter().map(|(p, _)| *p).collect()
    }

    /// Samples dropped as missing or non-finite across all phases.
    pub fn dropped(&self) -> usize {
        self.series.iter().map(|(_, s)| s.dropped()).sum()
    }
}
