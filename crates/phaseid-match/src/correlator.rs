//! Customer-phase × feeder-phase score matrix.

use phaseid_core::{AnalysisConfig, CustomerId, FeederId, PhaseMatch};
use phaseid_ts::compare;

use crate::prepared::PreparedMeter;

/// Score every (customer phase, feeder phase) pair, row-major in A, B, C
/// order. Pairs below the minimum aligned points are left out.
pub fn correlate_phases(
    customer: &PreparedMeter<CustomerId>,
    feeder: &PreparedMeter<FeederId>,
    config: &AnalysisConfig,
) -> Vec<PhaseMatch> {
    let mut matrix = Vec::with_capacity(customer.series.len() * feeder.series.len());
    for (customer_phase, customer_series) in &customer.series {
        for (feeder_phase, feeder_series) in &feeder.series {
            if let Some(metrics) = compare(customer_series, feeder_series, config) {
                matrix.push(PhaseMatch {
                    customer_phase: *customer_phase,
                    feeder_phase: *feeder_phase,
                    metrics,
                });
            }
        }
    }
    matrix
}
