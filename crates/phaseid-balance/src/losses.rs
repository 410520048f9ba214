//! Simplified resistive loss estimate per phase.

use serde::{Deserialize, Serialize};

use phaseid_core::{Phase, Volts};

use crate::aggregate::FeederLoads;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseLoss {
    pub phase: Phase,
    pub current_a: f64,
    pub loss_kw: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossReport {
    pub phase_losses: Vec<PhaseLoss>,
    pub total_losses_kw: f64,
    /// Losses as a share of the feeder's total real load; 0 without load.
    pub loss_pct: f64,
}

/// `I = P / V` per phase and `I²R` losses in kW. Phases without a positive
/// voltage are skipped.
pub fn phase_losses(feeder: &FeederLoads, feeder_resistance_ohm: f64) -> LossReport {
    let phase_losses: Vec<PhaseLoss> = feeder
        .phases
        .iter()
        .filter(|p| p.avg_voltage > Volts(0.0))
        .map(|p| {
            let current_a = p.total_real_kw.current_at(p.avg_voltage);
            PhaseLoss {
                phase: p.phase,
                current_a,
                loss_kw: current_a.powi(2) * feeder_resistance_ohm / 1000.0,
            }
        })
        .collect();
    let total_losses_kw = phase_losses.iter().map(|l| l.loss_kw).sum();
    let total_load = feeder.total_real_kw().value();
    LossReport {
        phase_losses,
        total_losses_kw,
        loss_pct: if total_load > 0.0 {
            total_losses_kw / total_load * 100.0
        } else {
            0.0
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate_phase_loads;
    use crate::test_support::{assignment, loads_of};
    use phaseid_core::AnalysisConfig;

    #[test]
    fn hand_computed_losses() {
        // 23 kW at 230 V is 100 A; 100² × 0.5 Ω = 5 kW.
        let feeders = aggregate_phase_loads(
            &[assignment("C1", "F1", &[Phase::A])],
            &loads_of(&[("C1", 23.0, Some(230.0))]),
            &AnalysisConfig::default(),
        );
        let report = phase_losses(&feeders[0], 0.5);
        assert_eq!(report.phase_losses.len(), 3);
        let a = report.phase_losses[0];
        assert!((a.current_a - 100.0).abs() < 1e-9);
        assert!((a.loss_kw - 5.0).abs() < 1e-9);
        assert_eq!(report.phase_losses[1].loss_kw, 0.0);
        assert!((report.total_losses_kw - 5.0).abs() < 1e-9);
        assert!((report.loss_pct - 5.0 / 23.0 * 100.0).abs() < 1e-9);
    }

    #[test]
    fn no_load_means_zero_percentage() {
        let feeders = aggregate_phase_loads(
            &[assignment("C1", "F1", &[Phase::A])],
            &loads_of(&[("C1", 0.0, None)]),
            &AnalysisConfig::default(),
        );
        let report = phase_losses(&feeders[0], 0.5);
        assert_eq!(report.total_losses_kw, 0.0);
        assert_eq!(report.loss_pct, 0.0);
    }
}
