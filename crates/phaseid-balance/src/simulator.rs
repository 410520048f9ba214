//! What-if application of balancing moves.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use phaseid_core::{AnalysisConfig, CustomerAssignment, LoadTable, Phase, PhaseAssignment};

use crate::aggregate::aggregate_phase_loads;
use crate::imbalance::imbalance_ratio;
use crate::optimizer::{suggest_moves, BalancingMove};

/// Fleet-wide balance figures for one assignment set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BalanceStats {
    /// Mean imbalance ratio over feeders (0 without feeders).
    pub avg_imbalance: f64,
    pub total_load_kw: f64,
    /// Mean of the per-phase average voltages.
    pub avg_voltage: f64,
    pub balanced_feeders: usize,
    pub total_feeders: usize,
}

pub fn balance_stats(
    assignments: &[CustomerAssignment],
    loads: &LoadTable,
    config: &AnalysisConfig,
) -> BalanceStats {
    let feeders = aggregate_phase_loads(assignments, loads, config);
    let ratios: Vec<f64> = feeders.iter().map(|f| imbalance_ratio(f.real_kw())).collect();
    let voltages: Vec<f64> = feeders
        .iter()
        .flat_map(|f| f.phases.iter().map(|p| p.avg_voltage.value()))
        .collect();
    BalanceStats {
        avg_imbalance: if ratios.is_empty() {
            0.0
        } else {
            ratios.iter().sum::<f64>() / ratios.len() as f64
        },
        total_load_kw: feeders.iter().map(|f| f.total_real_kw().value()).sum(),
        avg_voltage: if voltages.is_empty() {
            config.nominal_voltage
        } else {
            voltages.iter().sum::<f64>() / voltages.len() as f64
        },
        balanced_feeders: ratios
            .iter()
            .filter(|r| **r <= config.balancing.imbalance_threshold)
            .count(),
        total_feeders: feeders.len(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationImprovements {
    pub imbalance_reduction: f64,
    pub loss_reduction_pct: f64,
    pub voltage_improvement: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub before: BalanceStats,
    pub after: BalanceStats,
    pub improvements: SimulationImprovements,
    pub moves_applied: usize,
    /// Moves naming a customer missing from the assignment set.
    pub moves_skipped: usize,
}

/// Loss proxy: losses scale with `(1 + imbalance)²`. Never negative.
pub fn loss_reduction_pct(imbalance_before: f64, imbalance_after: f64) -> f64 {
    let before = (1.0 + imbalance_before).powi(2);
    let after = (1.0 + imbalance_after).powi(2);
    if before > 0.0 {
        ((before - after) / before * 100.0).max(0.0)
    } else {
        0.0
    }
}

/// Copy of `assignments` with each move applied: every phase assignment of
/// the moved customer is set to the move's target phase. Returns the copy
/// plus applied and skipped move counts.
pub fn apply_moves(
    assignments: &[CustomerAssignment],
    moves: &[BalancingMove],
) -> (Vec<CustomerAssignment>, usize, usize) {
    let mut updated = assignments.to_vec();
    let (mut applied, mut skipped) = (0, 0);
    for mv in moves {
        let Some(target) = updated.iter_mut().find(|a| a.customer_id == mv.customer_id) else {
            debug!(customer = %mv.customer_id, "move names unknown customer, skipped");
            skipped += 1;
            continue;
        };
        if target.phase_assignments.is_empty() {
            target.phase_assignments.push(PhaseAssignment {
                customer_phase: Phase::A,
                assigned_feeder_phase: mv.to_phase,
                metrics: target.metrics,
            });
        }
        for pa in &mut target.phase_assignments {
            pa.assigned_feeder_phase = mv.to_phase;
        }
        applied += 1;
    }
    (updated, applied, skipped)
}

/// Apply `moves` to a copy of the assignment set and compare balance
/// before and after. The input set is not modified.
pub fn simulate_moves(
    assignments: &[CustomerAssignment],
    moves: &[BalancingMove],
    loads: &LoadTable,
    config: &AnalysisConfig,
) -> SimulationResult {
    let (updated, moves_applied, moves_skipped) = apply_moves(assignments, moves);
    let before = balance_stats(assignments, loads, config);
    let after = balance_stats(&updated, loads, config);
    SimulationResult {
        improvements: SimulationImprovements {
            imbalance_reduction: before.avg_imbalance - after.avg_imbalance,
            loss_reduction_pct: loss_reduction_pct(before.avg_imbalance, after.avg_imbalance),
            voltage_improvement: after.avg_voltage - before.avg_voltage,
        },
        before,
        after,
        moves_applied,
        moves_skipped,
    }
}

/// Simulate the top `simulate_top_moves` suggestions for the assignment set.
pub fn simulate_top_moves(
    assignments: &[CustomerAssignment],
    loads: &LoadTable,
    config: &AnalysisConfig,
) -> SimulationResult {
    let suggestions = suggest_moves(assignments, loads, config);
    let top = suggestions
        .suggestions
        .len()
        .min(config.balancing.simulate_top_moves);
    let result = simulate_moves(assignments, &suggestions.suggestions[..top], loads, config);
    info!(
        moves = result.moves_applied,
        imbalance_before = result.before.avg_imbalance,
        imbalance_after = result.after.avg_imbalance,
        "balancing simulated"
    );
    result
}
