//! Summary statistics of transformer telemetry.

use serde::{Deserialize, Serialize};

use phaseid_core::{Phase, TransformerSample};
use phaseid_ts::{max_deviation_ratio, Summary};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSummary {
    pub phase: Phase,
    #[serde(flatten)]
    pub summary: Summary,
}

/// Per-phase statistics of one quantity (current or voltage).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreePhaseStats {
    pub phases: Vec<PhaseSummary>,
    /// Max deviation of the phase means from their average, in percent.
    /// Absent when the average is not positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imbalance_pct: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Utilization {
    pub capacity_kva: f64,
    pub peak_load_kva: f64,
    pub utilization_pct: f64,
    pub available_capacity_kva: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerAnalysis {
    pub total_records: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currents: Option<ThreePhaseStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voltages: Option<ThreePhaseStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_kw: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_kva: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power_factor: Option<Summary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utilization: Option<Utilization>,
}

/// Summarize transformer telemetry. A quantity with no usable readings is
/// left out; three-phase sections need readings on all three phases.
pub fn analyze_transformer(samples: &[TransformerSample], capacity_kva: f64) -> TransformerAnalysis {
    let load_kva = Summary::from_values(samples.iter().filter_map(|s| s.import_kva));
    TransformerAnalysis {
        total_records: samples.len(),
        currents: three_phase(samples, |s| s.current),
        voltages: three_phase(samples, |s| s.voltage),
        load_kw: Summary::from_values(samples.iter().filter_map(|s| s.import_kw)),
        power_factor: Summary::from_values(samples.iter().filter_map(|s| s.power_factor)),
        utilization: load_kva.map(|kva| Utilization {
            capacity_kva,
            peak_load_kva: kva.max,
            utilization_pct: kva.max / capacity_kva * 100.0,
            available_capacity_kva: capacity_kva - kva.max,
        }),
        load_kva,
    }
}

fn three_phase(
    samples: &[TransformerSample],
    field: impl Fn(&TransformerSample) -> [Option<f64>; 3],
) -> Option<ThreePhaseStats> {
    let mut phases = Vec::with_capacity(3);
    for phase in Phase::ALL {
        let summary = Summary::from_values(samples.iter().filter_map(|s| field(s)[phase.index()]))?;
        phases.push(PhaseSummary { phase, summary });
    }
    let means: Vec<f64> = phases.iter().map(|p| p.summary.mean).collect();
    Some(ThreePhaseStats {
        imbalance_pct: max_deviation_ratio(&means).map(|r| r * 100.0),
        phases,
    })
}
