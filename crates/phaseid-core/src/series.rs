//! Voltage series as delivered by the ingestion layer.
//!
//! A [`Meter`] is either the feeder-head NMD or one customer meter. It holds
//! one [`PhaseSeries`] per measured phase. Samples arrive in whatever order
//! the source produced them and may carry missing voltages; the alignment
//! code in `phaseid-ts` sorts and filters on its own copy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PhaseIdError;

/// One of the three conductors of a three-phase feeder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Phase {
    #[serde(rename = "Phase A", alias = "A")]
    A,
    #[serde(rename = "Phase B", alias = "B")]
    B,
    #[serde(rename = "Phase C", alias = "C")]
    C,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::A, Phase::B, Phase::C];

    /// Position in A, B, C order.
    pub fn index(self) -> usize {
        match self {
            Phase::A => 0,
            Phase::B => 1,
            Phase::C => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Phase> {
        Phase::ALL.get(index).copied()
    }

    pub fn letter(self) -> char {
        match self {
            Phase::A => 'A',
            Phase::B => 'B',
            Phase::C => 'C',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::A => "Phase A",
            Phase::B => "Phase B",
            Phase::C => "Phase C",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = PhaseIdError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_ascii_uppercase().replace(['_', ' '], "");
        let letter = normalized.strip_prefix("PHASE").unwrap_or(&normalized);
        match letter {
            "A" => Ok(Phase::A),
            "B" => Ok(Phase::B),
            "C" => Ok(Phase::C),
            _ => Err(PhaseIdError::Parse(format!(
                "unknown phase '{}'; expected A, B or C",
                input
            ))),
        }
    }
}

/// A single voltage reading. `voltage` is `None` when the source value was
/// missing or not numeric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub voltage: Option<f64>,
}

impl Sample {
    pub fn new(timestamp: DateTime<Utc>, voltage: f64) -> Self {
        Self {
            timestamp,
            voltage: Some(voltage),
        }
    }

    pub fn missing(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            voltage: None,
        }
    }

    /// The voltage if it is usable for correlation.
    pub fn usable_voltage(&self) -> Option<f64> {
        self.voltage.filter(|v| v.is_finite())
    }
}

/// Voltage readings for one phase of one meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSeries {
    pub phase: Phase,
    pub samples: Vec<Sample>,
}

impl PhaseSeries {
    pub fn new(phase: Phase, samples: Vec<Sample>) -> Self {
        Self { phase, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of samples that would be dropped before alignment.
    pub fn unusable_count(&self) -> usize {
        self.samples
            .iter()
            .filter(|s| s.usable_voltage().is_none())
            .count()
    }
}

/// A feeder or customer meter with its 1–3 phase series, kept in A, B, C order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meter<I> {
    pub id: I,
    pub phases: Vec<PhaseSeries>,
}

impl<I> Meter<I> {
    pub fn new(id: I) -> Self {
        Self {
            id,
            phases: Vec::new(),
        }
    }

    /// Builder-style variant of [`Meter::insert_phase`].
    pub fn with_phase(mut self, phase: Phase, samples: Vec<Sample>) -> Self {
        self.insert_phase(PhaseSeries::new(phase, samples));
        self
    }

    /// Insert a series, replacing any existing series for the same phase.
    pub fn insert_phase(&mut self, series: PhaseSeries) {
        match self.phases.binary_search_by_key(&series.phase, |s| s.phase) {
            Ok(pos) => self.phases[pos] = series,
            Err(pos) => self.phases.insert(pos, series),
        }
    }

    /// Series used for feeder selection: the first phase in A, B, C order.
    pub fn primary(&self) -> Option<&PhaseSeries> {
        self.phases.first()
    }

    pub fn phase(&self, phase: Phase) -> Option<&PhaseSeries> {
        self.phases.iter().find(|s| s.phase == phase)
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    pub fn unusable_count(&self) -> usize {
        self.phases.iter().map(PhaseSeries::unusable_count).sum()
    }
}
