//! Match candidates, resolved assignments, and the output of one batch run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::diagnostics::Diagnostics;
use crate::series::Phase;
use crate::{CustomerId, FeederId};

/// Similarity of two aligned voltage series.
///
/// `score = |r| - rmse_weight * rmse / nominal_voltage`. It has no fixed
/// bound and is only ever used to rank candidates against each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchMetrics {
    pub correlation: f64,
    pub rmse: f64,
    pub score: f64,
    pub aligned_points: usize,
}

/// One evaluated (customer, feeder) candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederMatch {
    pub feeder_id: FeederId,
    #[serde(flatten)]
    pub metrics: MatchMetrics,
}

/// One cell of the customer-phase × feeder-phase score matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseMatch {
    pub customer_phase: Phase,
    pub feeder_phase: Phase,
    #[serde(flatten)]
    pub metrics: MatchMetrics,
}

/// The feeder phase a customer phase was resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseAssignment {
    pub customer_phase: Phase,
    pub assigned_feeder_phase: Phase,
    #[serde(flatten)]
    pub metrics: MatchMetrics,
}

impl From<&PhaseMatch> for PhaseAssignment {
    fn from(m: &PhaseMatch) -> Self {
        Self {
            customer_phase: m.customer_phase,
            assigned_feeder_phase: m.feeder_phase,
            metrics: m.metrics,
        }
    }
}

/// Final wiring decision for one customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerAssignment {
    pub customer_id: CustomerId,
    pub assigned_feeder_id: FeederId,
    /// Metrics of the winning feeder candidate (primary phases).
    #[serde(flatten)]
    pub metrics: MatchMetrics,
    /// One entry per detected customer phase, ordered A, B, C.
    pub phase_assignments: Vec<PhaseAssignment>,
    /// Full score matrix against the selected feeder.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub phase_matches: Vec<PhaseMatch>,
}

impl CustomerAssignment {
    /// Feeder phases this customer occupies, in assignment order. Customers
    /// without phase detail are treated as sitting on Phase A.
    pub fn feeder_phases(&self) -> Vec<Phase> {
        if self.phase_assignments.is_empty() {
            vec![Phase::A]
        } else {
            self.phase_assignments
                .iter()
                .map(|pa| pa.assigned_feeder_phase)
                .collect()
        }
    }
}

/// Why a customer produced no assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedReason {
    /// The customer meter had no phase series at all.
    NoPrimarySeries,
    /// No feeder candidate reached the minimum aligned points.
    NoCandidateFeeder,
    /// A customer phase had no feeder phase with enough aligned points.
    IncompletePhaseMatrix,
}

impl UnmatchedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnmatchedReason::NoPrimarySeries => "customer has no voltage series",
            UnmatchedReason::NoCandidateFeeder => "no feeder reached the minimum aligned points",
            UnmatchedReason::IncompletePhaseMatrix => {
                "a customer phase matched no feeder phase"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedCustomer {
    pub customer_id: CustomerId,
    pub reason: UnmatchedReason,
}

/// Spread of correlation and RMSE over all assignments of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    pub avg_correlation: f64,
    pub max_correlation: f64,
    pub min_correlation: f64,
    pub avg_rmse: f64,
    pub max_rmse: f64,
    pub min_rmse: f64,
}

impl SummaryStats {
    pub fn from_assignments(assignments: &[CustomerAssignment]) -> Option<Self> {
        if assignments.is_empty() {
            return None;
        }
        let n = assignments.len() as f64;
        let mut stats = SummaryStats {
            avg_correlation: 0.0,
            max_correlation: f64::NEG_INFINITY,
            min_correlation: f64::INFINITY,
            avg_rmse: 0.0,
            max_rmse: f64::NEG_INFINITY,
            min_rmse: f64::INFINITY,
        };
        for a in assignments {
            let m = &a.metrics;
            stats.avg_correlation += m.correlation / n;
            stats.max_correlation = stats.max_correlation.max(m.correlation);
            stats.min_correlation = stats.min_correlation.min(m.correlation);
            stats.avg_rmse += m.rmse / n;
            stats.max_rmse = stats.max_rmse.max(m.rmse);
            stats.min_rmse = stats.min_rmse.min(m.rmse);
        }
        Some(stats)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisMetadata {
    pub total_customers: usize,
    pub total_feeders: usize,
    pub available_feeders: Vec<FeederId>,
    pub tolerance_minutes: f64,
    pub min_aligned_points: usize,
    pub resolver: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Output of one batch run. Replaced wholesale on every re-run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    /// Sorted by feeder correlation, highest first (ties by customer id).
    pub assignments: Vec<CustomerAssignment>,
    #[serde(default)]
    pub unmatched: Vec<UnmatchedCustomer>,
    #[serde(default)]
    pub summary: Option<SummaryStats>,
    pub metadata: AnalysisMetadata,
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

impl AnalysisResults {
    pub fn new(
        mut assignments: Vec<CustomerAssignment>,
        mut unmatched: Vec<UnmatchedCustomer>,
        metadata: AnalysisMetadata,
        diagnostics: Diagnostics,
    ) -> Self {
        assignments.sort_by(|a, b| {
            b.metrics
                .correlation
                .total_cmp(&a.metrics.correlation)
                .then_with(|| a.customer_id.cmp(&b.customer_id))
        });
        unmatched.sort_by(|a, b| a.customer_id.cmp(&b.customer_id));
        let summary = SummaryStats::from_assignments(&assignments);
        Self {
            assignments,
            unmatched,
            summary,
            metadata,
            diagnostics,
        }
    }

    pub fn matched_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn unmatched_count(&self) -> usize {
        self.metadata
            .total_customers
            .saturating_sub(self.assignments.len())
    }

    /// Assignments grouped per feeder, feeders in id order.
    pub fn by_feeder(&self) -> BTreeMap<&FeederId, Vec<&CustomerAssignment>> {
        let mut groups: BTreeMap<&FeederId, Vec<&CustomerAssignment>> = BTreeMap::new();
        for assignment in &self.assignments {
            groups
                .entry(&assignment.assigned_feeder_id)
                .or_default()
                .push(assignment);
        }
        groups
    }

    pub fn status_message(&self) -> String {
        if self.assignments.is_empty() {
            return format!(
                "No customer-feeder matches found for {} customers; check data quality and time alignment",
                self.metadata.total_customers
            );
        }
        match self.unmatched_count() {
            0 => format!(
                "All {} customers assigned to feeders",
                self.metadata.total_customers
            ),
            n => format!(
                "{} of {} customers could not be matched",
                n, self.metadata.total_customers
            ),
        }
    }
}
