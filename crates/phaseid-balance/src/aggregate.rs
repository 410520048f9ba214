//! Per-(feeder, phase) load totals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use phaseid_core::{
    AnalysisConfig, CustomerAssignment, CustomerId, FeederId, Kilovars, Kilowatts, LoadTable,
    Phase, Volts,
};

/// Mean load of one customer, with defaults filled in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerLoad {
    pub real_kw: Kilowatts,
    pub reactive_kvar: Kilovars,
    /// Mean measured voltage, if the customer reported any.
    pub voltage: Option<Volts>,
}

/// Resolve a customer's mean load from its profile. Missing real or reactive
/// power falls back to the configured default load.
pub fn customer_load(id: &CustomerId, loads: &LoadTable, config: &AnalysisConfig) -> CustomerLoad {
    let default = config.balancing.default_load;
    let profile = loads.get(id);
    CustomerLoad {
        real_kw: Kilowatts(
            profile
                .and_then(|p| p.mean_real_kw())
                .unwrap_or(default.real_kw),
        ),
        reactive_kvar: Kilovars(
            profile
                .and_then(|p| p.mean_reactive_kvar())
                .unwrap_or(default.reactive_kvar),
        ),
        voltage: profile.and_then(|p| p.mean_voltage()).map(Volts),
    }
}

/// Mean load of every customer in the assignment set.
pub fn customer_loads(
    assignments: &[CustomerAssignment],
    loads: &LoadTable,
    config: &AnalysisConfig,
) -> HashMap<CustomerId, CustomerLoad> {
    assignments
        .iter()
        .map(|a| (a.customer_id.clone(), customer_load(&a.customer_id, loads, config)))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseLoad {
    pub feeder_id: FeederId,
    pub phase: Phase,
    pub total_real_kw: Kilowatts,
    pub total_reactive_kvar: Kilovars,
    /// One entry per membership, in assignment order. A customer wired
    /// twice to this phase appears twice.
    pub customers: Vec<CustomerId>,
    pub avg_voltage: Volts,
    pub min_voltage: Volts,
    pub max_voltage: Volts,
}

impl PhaseLoad {
    pub fn customer_count(&self) -> usize {
        self.customers.len()
    }
}

/// The three phase loads of one feeder, indexed A, B, C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeederLoads {
    pub feeder_id: FeederId,
    pub phases: [PhaseLoad; 3],
}

impl FeederLoads {
    pub fn phase(&self, phase: Phase) -> &PhaseLoad {
        &self.phases[phase.index()]
    }

    /// Real power per phase in A, B, C order.
    pub fn real_kw(&self) -> [f64; 3] {
        [
            self.phases[0].total_real_kw.value(),
            self.phases[1].total_real_kw.value(),
            self.phases[2].total_real_kw.value(),
        ]
    }

    pub fn total_real_kw(&self) -> Kilowatts {
        self.phases.iter().map(|p| p.total_real_kw).sum()
    }

    /// Distinct customers on the feeder.
    pub fn customer_count(&self) -> usize {
        let mut ids: Vec<&CustomerId> = self.phases.iter().flat_map(|p| &p.customers).collect();
        ids.sort();
        ids.dedup();
        ids.len()
    }
}

/// Group the assignment set by feeder and assigned feeder phase and total
/// the members' mean loads. Every feeder yields all three phases; feeders
/// keep first-seen order.
pub fn aggregate_phase_loads(
    assignments: &[CustomerAssignment],
    loads: &LoadTable,
    config: &AnalysisConfig,
) -> Vec<FeederLoads> {
    let per_customer = customer_loads(assignments, loads, config);
    let mut groups: Vec<(&FeederId, [Vec<&CustomerId>; 3])> = Vec::new();
    for assignment in assignments {
        let pos = match groups
            .iter()
            .position(|(id, _)| *id == &assignment.assigned_feeder_id)
        {
            Some(pos) => pos,
            None => {
                groups.push((&assignment.assigned_feeder_id, Default::default()));
                groups.len() - 1
            }
        };
        for phase in assignment.feeder_phases() {
            groups[pos].1[phase.index()].push(&assignment.customer_id);
        }
    }

    let nominal = Volts(config.nominal_voltage);
    groups
        .into_iter()
        .map(|(feeder_id, members)| {
            let phases = Phase::ALL.map(|phase| {
                let customers = &members[phase.index()];
                let mut real = Kilowatts::default();
                let mut reactive = Kilovars::default();
                let mut voltages = Vec::new();
                for id in customers {
                    if let Some(load) = per_customer.get(*id) {
                        real += load.real_kw;
                        reactive += load.reactive_kvar;
                        voltages.extend(load.voltage);
                    }
                }
                let (avg, min, max) = if voltages.is_empty() {
                    (nominal, nominal, nominal)
                } else {
                    let sum: Volts = voltages.iter().sum();
                    (
                        sum / voltages.len() as f64,
                        voltages.iter().copied().fold(Volts(f64::INFINITY), Volts::min),
                        voltages.iter().copied().fold(Volts(f64::NEG_INFINITY), Volts::max),
                    )
                };
                PhaseLoad {
                    feeder_id: feeder_id.clone(),
                    phase,
                    total_real_kw: real,
                    total_reactive_kvar: reactive,
                    customers: customers.iter().map(|id| (*id).clone()).collect(),
                    avg_voltage: avg,
                    min_voltage: min,
                    max_voltage: max,
                }
            });
            FeederLoads {
                feeder_id: feeder_id.clone(),
                phases,
            }
        })
        .collect()
}
