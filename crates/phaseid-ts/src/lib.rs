//! Time-series primitives for voltage matching: cleaning, nearest-neighbour
//! alignment under a tolerance window, and the Pearson/RMSE composite score.

pub mod align;
pub mod stats;

pub use align::{align, AlignedPair, CleanSeries};
pub use stats::{match_score, max_deviation_ratio, pearson, rmse, Summary};

use phaseid_core::{AnalysisConfig, MatchMetrics};

/// Align two cleaned series and score them.
///
/// Returns `None` when fewer than `min_aligned_points` pairs survive
/// alignment; such a candidate is never reported.
pub fn compare(customer: &CleanSeries, feeder: &CleanSeries, config: &AnalysisConfig) -> Option<MatchMetrics> {
    let pairs = align(customer, feeder, config.matching.tolerance());
    metrics_for_pairs(&pairs, config)
}

/// Score an already-aligned set of pairs.
pub fn metrics_for_pairs(pairs: &[AlignedPair], config: &AnalysisConfig) -> Option<MatchMetrics> {
    if pairs.len() < config.matching.min_aligned_points {
        return None;
    }
    let (customer, feeder): (Vec<f64>, Vec<f64>) = pairs
        .iter()
        .map(|p| (p.customer_voltage, p.feeder_voltage))
        .unzip();
    let correlation = pearson(&customer, &feeder);
    let error = rmse(&customer, &feeder);
    Some(MatchMetrics {
        correlation,
        rmse: error,
        score: match_score(
            correlation,
            error,
            config.matching.rmse_weight,
            config.nominal_voltage,
        ),
        aligned_points: pairs.len(),
    })
}
