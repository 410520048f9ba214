//! Relabelling customer series to the feeder phases they were matched to.

use serde::{Deserialize, Serialize};

use phaseid_core::{CustomerAssignment, CustomerMeter, Phase, PhaseIdError, PhaseIdResult, PhaseSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseCorrection {
    pub customer_phase: Phase,
    pub feeder_phase: Phase,
}

impl PhaseCorrection {
    /// True when the meter's label disagrees with the matched feeder phase.
    pub fn is_relabel(&self) -> bool {
        self.customer_phase != self.feeder_phase
    }
}

pub fn phase_corrections(assignment: &CustomerAssignment) -> Vec<PhaseCorrection> {
    assignment
        .phase_assignments
        .iter()
        .map(|pa| PhaseCorrection {
            customer_phase: pa.customer_phase,
            feeder_phase: pa.assigned_feeder_phase,
        })
        .collect()
}

/// Copy of `meter` with every series relabelled to its assigned feeder
/// phase. Series without an assignment keep their label.
///
/// Fails when two series would end up on the same phase, which happens
/// when the greedy resolver maps two customer phases to one feeder phase.
pub fn apply_phase_corrections(
    meter: &CustomerMeter,
    assignment: &CustomerAssignment,
) -> PhaseIdResult<CustomerMeter> {
    let corrections = phase_corrections(assignment);
    let mut corrected = CustomerMeter::new(meter.id.clone());
    for series in &meter.phases {
        let target = corrections
            .iter()
            .find(|c| c.customer_phase == series.phase)
            .map_or(series.phase, |c| c.feeder_phase);
        if corrected.phase(target).is_some() {
            return Err(PhaseIdError::Validation(format!(
                "customer {}: more than one series maps to feeder {}",
                meter.id, target
            )));
        }
        corrected.insert_phase(PhaseSeries::new(target, series.samples.clone()));
    }
    Ok(corrected)
}
