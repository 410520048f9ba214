//! Strategies that turn a phase score matrix into phase assignments.

use phaseid_core::{Phase, PhaseAssignment, PhaseMatch, ResolverKind};

/// Resolves one customer's phase score matrix.
///
/// Implementations return exactly one assignment per customer phase, in the
/// order of `customer_phases`, or `None` when some customer phase has no
/// scored feeder phase at all.
pub trait PhaseResolver: Send + Sync {
    fn name(&self) -> &'static str;

    fn resolve(
        &self,
        customer_phases: &[Phase],
        feeder_phases: &[Phase],
        matrix: &[PhaseMatch],
    ) -> Option<Vec<PhaseAssignment>>;
}

pub fn build_resolver(kind: ResolverKind) -> Box<dyn PhaseResolver> {
    match kind {
        ResolverKind::Greedy => Box::new(GreedyResolver),
        ResolverKind::Optimal => Box::new(OptimalResolver),
    }
}

/// Per-row argmax. Two customer phases may land on the same feeder phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyResolver;

impl PhaseResolver for GreedyResolver {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn resolve(
        &self,
        customer_phases: &[Phase],
        _feeder_phases: &[Phase],
        matrix: &[PhaseMatch],
    ) -> Option<Vec<PhaseAssignment>> {
        customer_phases
            .iter()
            .map(|&phase| {
                let mut best: Option<&PhaseMatch> = None;
                for cell in matrix.iter().filter(|m| m.customer_phase == phase) {
                    if best.map_or(true, |b| cell.metrics.score > b.metrics.score) {
                        best = Some(cell);
                    }
                }
                best.map(PhaseAssignment::from)
            })
            .collect()
    }
}

/// Exhaustive search over one-to-one phase mappings maximizing the summed
/// score. With at most three phases per side this is at most 6 mappings.
///
/// Falls back to [`GreedyResolver`] when the customer has more phases than
/// the feeder, or when missing cells leave no complete one-to-one mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimalResolver;

impl PhaseResolver for OptimalResolver {
    fn name(&self) -> &'static str {
        "optimal"
    }

    fn resolve(
        &self,
        customer_phases: &[Phase],
        feeder_phases: &[Phase],
        matrix: &[PhaseMatch],
    ) -> Option<Vec<PhaseAssignment>> {
        if customer_phases.len() > feeder_phases.len() {
            return GreedyResolver.resolve(customer_phases, feeder_phases, matrix);
        }
        let cell = |c: Phase, f: Phase| {
            matrix
                .iter()
                .find(|m| m.customer_phase == c && m.feeder_phase == f)
        };

        let mut best: Option<(f64, Vec<&PhaseMatch>)> = None;
        let mut used = vec![false; feeder_phases.len()];
        let mut current = Vec::with_capacity(customer_phases.len());
        search(
            customer_phases,
            feeder_phases,
            &cell,
            &mut used,
            &mut current,
            &mut best,
        );

        match best {
            Some((_, cells)) => Some(cells.into_iter().map(PhaseAssignment::from).collect()),
            None => GreedyResolver.resolve(customer_phases, feeder_phases, matrix),
        }
    }
}

fn search<'a, F>(
    customer_phases: &[Phase],
    feeder_phases: &[Phase],
    cell: &F,
    used: &mut [bool],
    current: &mut Vec<&'a PhaseMatch>,
    best: &mut Option<(f64, Vec<&'a PhaseMatch>)>,
) where
    F: Fn(Phase, Phase) -> Option<&'a PhaseMatch>,
{
    let depth = current.len();
    if depth == customer_phases.len() {
        let total: f64 = current.iter().map(|m| m.metrics.score).sum();
        if best.as_ref().map_or(true, |(score, _)| total > *score) {
            *best = Some((total, current.clone()));
        }
        return;
    }
    for (i, &feeder_phase) in feeder_phases.iter().enumerate() {
        if used[i] {
            continue;
        }
        let Some(m) = cell(customer_phases[depth], feeder_phase) else {
            continue;
        };
        used[i] = true;
        current.push(m);
        search(customer_phases, feeder_phases, cell, used, current, best);
        current.pop();
        used[i] = false;
    }
}
