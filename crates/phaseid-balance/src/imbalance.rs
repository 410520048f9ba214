//! Three-phase imbalance of each feeder.

use serde::{Deserialize, Serialize};

use phaseid_core::{AnalysisConfig, CustomerAssignment, FeederId, LoadTable, TransformerSample};

use crate::aggregate::{aggregate_phase_loads, FeederLoads, PhaseLoad};
use crate::transformer::{analyze_transformer, TransformerAnalysis};

/// `max(|load - mean|) / mean` over the three phase loads; 0 when the mean
/// is 0.
pub fn imbalance_ratio(loads: [f64; 3]) -> f64 {
    let mean = loads.iter().sum::<f64>() / 3.0;
    if mean == 0.0 {
        return 0.0;
    }
    let max_dev = loads.iter().map(|l| (l - mean).abs()).fold(0.0, f64::max);
    max_dev / mean
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImbalanceReport {
    pub feeder_id: FeederId,
    pub phase_loads: Vec<PhaseLoad>,
    pub imbalance_ratio: f64,
    pub imbalance_pct: f64,
    pub is_balanced: bool,
    pub total_load_kw: f64,
    pub customer_count: usize,
}

impl ImbalanceReport {
    pub fn from_loads(feeder: &FeederLoads, threshold: f64) -> Self {
        let ratio = imbalance_ratio(feeder.real_kw());
        Self {
            feeder_id: feeder.feeder_id.clone(),
            phase_loads: feeder.phases.to_vec(),
            imbalance_ratio: ratio,
            imbalance_pct: ratio * 100.0,
            is_balanced: ratio <= threshold,
            total_load_kw: feeder.total_real_kw().value(),
            customer_count: feeder.customer_count(),
        }
    }
}

/// Balance state of every feeder in an assignment set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceAnalysis {
    pub feeders: Vec<ImbalanceReport>,
    pub balanced_feeders: Vec<FeederId>,
    pub imbalanced_feeders: Vec<FeederId>,
    pub total_feeders: usize,
    pub total_customers: usize,
    pub imbalance_threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<TransformerAnalysis>,
}

pub fn analyze_balance(
    assignments: &[CustomerAssignment],
    loads: &LoadTable,
    transformer: Option<&[TransformerSample]>,
    config: &AnalysisConfig,
) -> BalanceAnalysis {
    let threshold = config.balancing.imbalance_threshold;
    let feeders: Vec<ImbalanceReport> = aggregate_phase_loads(assignments, loads, config)
        .iter()
        .map(|f| ImbalanceReport::from_loads(f, threshold))
        .collect();
    let (balanced, imbalanced): (Vec<&ImbalanceReport>, Vec<&ImbalanceReport>) =
        feeders.iter().partition(|r| r.is_balanced);
    BalanceAnalysis {
        balanced_feeders: balanced.iter().map(|r| r.feeder_id.clone()).collect(),
        imbalanced_feeders: imbalanced.iter().map(|r| r.feeder_id.clone()).collect(),
        total_feeders: feeders.len(),
        total_customers: assignments.len(),
        imbalance_threshold: threshold,
        transformer: transformer
            .filter(|samples| !samples.is_empty())
            .map(|samples| analyze_transformer(samples, config.balancing.transformer_capacity_kva)),
        feeders,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assignment, loads_of};
    use phaseid_core::Phase;

    #[test]
    fn equal_loads_are_balanced() {
        assert_eq!(imbalance_ratio([10.0, 10.0, 10.0]), 0.0);
        assert_eq!(imbalance_ratio([0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn skewed_loads_are_imbalanced() {
        assert_eq!(imbalance_ratio([10.0, 10.0, 40.0]), 1.0);
        assert!((imbalance_ratio([12.0, 10.0, 8.0]) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn analysis_splits_balanced_and_imbalanced_feeders() {
        let assignments = vec![
            assignment("C1", "F1", &[Phase::A]),
            assignment("C2", "F1", &[Phase::B]),
            assignment("C3", "F1", &[Phase::C]),
            assignment("C4", "F2", &[Phase::A]),
            assignment("C5", "F2", &[Phase::B]),
            assignment("C6", "F2", &[Phase::C]),
            assignment("C7", "F2", &[Phase::C]),
        ];
        let loads = loads_of(&[("C6", 20.0, None), ("C7", 20.0, None)]);
        let analysis = analyze_balance(&assignments, &loads, None, &AnalysisConfig::default());

        assert_eq!(analysis.total_feeders, 2);
        assert_eq!(analysis.total_customers, 7);
        assert_eq!(analysis.balanced_feeders, vec![FeederId::new("F1")]);
        assert_eq!(analysis.imbalanced_feeders, vec![FeederId::new("F2")]);
        let f2 = &analysis.feeders[1];
        assert_eq!(f2.total_load_kw, 50.0);
        assert!((f2.imbalance_ratio - (40.0 - 50.0 / 3.0) / (50.0 / 3.0)).abs() < 1e-12);
        assert!((f2.imbalance_pct - f2.imbalance_ratio * 100.0).abs() < 1e-12);
        assert_eq!(f2.customer_count, 4);
        assert!(analysis.transformer.is_none());
    }

    #[test]
    fn threshold_boundary_is_balanced() {
        let feeder = crate::aggregate::aggregate_phase_loads(
            &[
                assignment("C1", "F1", &[Phase::A]),
                assignment("C2", "F1", &[Phase::B]),
                assignment("C3", "F1", &[Phase::C]),
            ],
            &loads_of(&[("C1", 23.0, None), ("C2", 17.0, None), ("C3", 20.0, None)]),
            &AnalysisConfig::default(),
        );
        let report = ImbalanceReport::from_loads(&feeder[0], 0.15);
        assert_eq!(report.imbalance_ratio, 0.15);
        assert!(report.is_balanced);
    }
}
