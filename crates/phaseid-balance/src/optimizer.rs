//! Phase-reassignment proposals for imbalanced feeders.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use phaseid_core::{
    AnalysisConfig, BalancedFeederEstimate, BalancingConfig, CustomerAssignment, CustomerId,
    FeederId, Kilowatts, LoadTable, MoveStrategyKind, Phase, EXHAUSTIVE_CUSTOMER_LIMIT,
};

use crate::aggregate::{aggregate_phase_loads, customer_loads, CustomerLoad, FeederLoads};
use crate::imbalance::imbalance_ratio;
use crate::simulator::apply_moves;

/// Feeder imbalance before and after a single move, with every other
/// customer left in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExpectedImprovement {
    pub imbalance_before: f64,
    pub imbalance_after: f64,
    pub imbalance_reduction: f64,
}

impl ExpectedImprovement {
    pub fn of_transfer(loads: [f64; 3], from: Phase, to: Phase, kw: Kilowatts) -> Self {
        let before = imbalance_ratio(loads);
        let mut after = loads;
        after[from.index()] -= kw.value();
        after[to.index()] += kw.value();
        let after = imbalance_ratio(after);
        Self {
            imbalance_before: before,
            imbalance_after: after,
            imbalance_reduction: before - after,
        }
    }
}

/// A proposed phase change. Proposals are never applied to the assignment
/// set; see [`crate::simulate_moves`] for a what-if run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingMove {
    pub customer_id: CustomerId,
    pub feeder_id: FeederId,
    pub from_phase: Phase,
    pub to_phase: Phase,
    pub customer_load_kw: Kilowatts,
    pub reason: String,
    pub expected_improvement: ExpectedImprovement,
}

/// Searches moves for one imbalanced feeder.
pub trait MoveStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn propose(
        &self,
        feeder: &FeederLoads,
        customer_loads: &HashMap<CustomerId, CustomerLoad>,
        config: &BalancingConfig,
    ) -> Vec<BalancingMove>;
}

pub fn build_move_strategy(kind: MoveStrategyKind, config: &BalancingConfig) -> Box<dyn MoveStrategy> {
    match kind {
        MoveStrategyKind::Greedy => Box::new(GreedyMoves),
        MoveStrategyKind::Exhaustive => Box::new(ExhaustiveMoves {
            max_customers: config.exhaustive_max_customers,
        }),
    }
}

fn load_of(id: &CustomerId, customer_loads: &HashMap<CustomerId, CustomerLoad>, config: &BalancingConfig) -> Kilowatts {
    customer_loads
        .get(id)
        .map(|l| l.real_kw)
        .unwrap_or(Kilowatts(config.default_load.real_kw))
}

/// Move customers off the most loaded phase onto the least loaded one, one
/// at a time, while each single move narrows the gap between the two.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyMoves;

impl MoveStrategy for GreedyMoves {
    fn name(&self) -> &'static str {
        "greedy"
    }

    fn propose(
        &self,
        feeder: &FeederLoads,
        customer_loads: &HashMap<CustomerId, CustomerLoad>,
        config: &BalancingConfig,
    ) -> Vec<BalancingMove> {
        let loads = feeder.real_kw();
        let mut order = Phase::ALL;
        order.sort_by(|a, b| loads[b.index()].total_cmp(&loads[a.index()]));
        let (most, least) = (order[0], order[2]);
        let (m, l) = (loads[most.index()], loads[least.index()]);
        let gap = m - l;
        if gap < config.min_gap_ratio * m {
            return Vec::new();
        }

        let mut moves = Vec::new();
        let mut seen = HashSet::new();
        for id in &feeder.phase(most).customers {
            if moves.len() >= config.max_moves_per_feeder {
                break;
            }
            if !seen.insert(id) {
                continue;
            }
            let kw = load_of(id, customer_loads, config);
            let new_most = m - kw.value();
            let new_least = l + kw.value();
            if (new_most - new_least).abs() < gap {
                moves.push(BalancingMove {
                    customer_id: id.clone(),
                    feeder_id: feeder.feeder_id.clone(),
                    from_phase: most,
                    to_phase: least,
                    customer_load_kw: kw,
                    reason: "Balance load distribution".to_string(),
                    expected_improvement: ExpectedImprovement::of_transfer(loads, most, least, kw),
                });
            }
        }
        moves
    }
}

/// Try every phase placement of the feeder's single-phase customers and
/// propose the moves reaching the lowest imbalance, preferring fewer moves.
///
/// Multi-phase customers stay where they are. Placements needing more than
/// `max_moves_per_feeder` moves are not considered. Feeders with more than
/// `max_customers` movable customers (never more than
/// [`EXHAUSTIVE_CUSTOMER_LIMIT`]) are handed to [`GreedyMoves`].
#[derive(Debug, Clone, Copy)]
pub struct ExhaustiveMoves {
    pub max_customers: usize,
}

const RATIO_EPS: f64 = 1e-9;

impl MoveStrategy for ExhaustiveMoves {
    fn name(&self) -> &'static str {
        "exhaustive"
    }

    fn propose(
        &self,
        feeder: &FeederLoads,
        customer_loads: &HashMap<CustomerId, CustomerLoad>,
        config: &BalancingConfig,
    ) -> Vec<BalancingMove> {
        let mut memberships: HashMap<&CustomerId, usize> = HashMap::new();
        for phase in &feeder.phases {
            for id in &phase.customers {
                *memberships.entry(id).or_default() += 1;
            }
        }

        let loads = feeder.real_kw();
        let mut fixed = loads;
        let mut movable: Vec<(&CustomerId, Phase, Kilowatts)> = Vec::new();
        for phase in &feeder.phases {
            for id in &phase.customers {
                if memberships.get(id) == Some(&1) {
                    let kw = load_of(id, customer_loads, config);
                    fixed[phase.phase.index()] -= kw.value();
                    movable.push((id, phase.phase, kw));
                }
            }
        }
        if movable.len() > self.max_customers.min(EXHAUSTIVE_CUSTOMER_LIMIT) {
            debug!(
                feeder = %feeder.feeder_id,
                movable = movable.len(),
                "too many customers for exhaustive search, using greedy"
            );
            return GreedyMoves.propose(feeder, customer_loads, config);
        }

        let mut best_ratio = imbalance_ratio(loads);
        let mut best_moves = 0usize;
        let mut best: Option<Vec<Phase>> = None;
        let mut placement = vec![Phase::A; movable.len()];
        let combinations = 3usize.pow(movable.len() as u32);
        for code in 0..combinations {
            let mut rest = code;
            let mut trial = fixed;
            let mut move_count = 0;
            for (slot, (_, current, kw)) in placement.iter_mut().zip(&movable) {
                let phase = Phase::ALL[rest % 3];
                rest /= 3;
                *slot = phase;
                trial[phase.index()] += kw.value();
                if phase != *current {
                    move_count += 1;
                }
            }
            if move_count == 0 || move_count > config.max_moves_per_feeder {
                continue;
            }
            let ratio = imbalance_ratio(trial);
            let better = ratio < best_ratio - RATIO_EPS
                || ((ratio - best_ratio).abs() <= RATIO_EPS && best.is_some() && move_count < best_moves);
            if better {
                best_ratio = ratio;
                best_moves = move_count;
                best = Some(placement.clone());
            }
        }

        let Some(best) = best else {
            return Vec::new();
        };
        movable
            .iter()
            .zip(best)
            .filter(|((_, current, _), target)| current != target)
            .map(|((id, current, kw), target)| BalancingMove {
                customer_id: (*id).clone(),
                feeder_id: feeder.feeder_id.clone(),
                from_phase: *current,
                to_phase: target,
                customer_load_kw: *kw,
                reason: "Optimal phase placement".to_string(),
                expected_improvement: ExpectedImprovement::of_transfer(loads, *current, target, *kw),
            })
            .collect()
    }
}

/// Pooled proposals over every imbalanced feeder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveSuggestions {
    /// Sorted by expected imbalance reduction, largest first.
    pub suggestions: Vec<BalancingMove>,
    pub total_suggestions: usize,
    pub estimated_balanced_feeders: usize,
    pub strategy: String,
    pub estimate: BalancedFeederEstimate,
}

pub fn suggest_moves(
    assignments: &[CustomerAssignment],
    loads: &LoadTable,
    config: &AnalysisConfig,
) -> MoveSuggestions {
    let balancing = &config.balancing;
    let per_customer = customer_loads(assignments, loads, config);
    let feeders = aggregate_phase_loads(assignments, loads, config);
    let strategy = build_move_strategy(balancing.move_strategy, balancing);

    let mut suggestions = Vec::new();
    for feeder in &feeders {
        let ratio = imbalance_ratio(feeder.real_kw());
        if ratio > balancing.imbalance_threshold {
            let moves = strategy.propose(feeder, &per_customer, balancing);
            debug!(
                feeder = %feeder.feeder_id,
                imbalance = ratio,
                proposals = moves.len(),
                strategy = strategy.name(),
                "feeder imbalanced"
            );
            suggestions.extend(moves);
        }
    }
    suggestions.sort_by(|a, b| {
        b.expected_improvement
            .imbalance_reduction
            .total_cmp(&a.expected_improvement.imbalance_reduction)
    });

    let estimated_balanced_feeders = match balancing.balanced_estimate {
        BalancedFeederEstimate::Heuristic => {
            heuristic_balanced_estimate(&feeders, &suggestions, balancing.imbalance_threshold)
        }
        BalancedFeederEstimate::Simulated => {
            simulated_balanced_estimate(assignments, &feeders, &suggestions, loads, config)
        }
    };

    MoveSuggestions {
        total_suggestions: suggestions.len(),
        suggestions,
        estimated_balanced_feeders,
        strategy: strategy.name().to_string(),
        estimate: balancing.balanced_estimate,
    }
}

/// Count feeders that end at or under the threshold when their own
/// proposals are applied one at a time, best first, stopping at the first
/// balanced state. Greedy proposals are each sized against the unmoved
/// loads, so applying all of them can overshoot.
fn simulated_balanced_estimate(
    assignments: &[CustomerAssignment],
    feeders: &[FeederLoads],
    suggestions: &[BalancingMove],
    loads: &LoadTable,
    config: &AnalysisConfig,
) -> usize {
    let threshold = config.balancing.imbalance_threshold;
    feeders
        .iter()
        .filter(|feeder| {
            if imbalance_ratio(feeder.real_kw()) <= threshold {
                return true;
            }
            let mut working: Vec<CustomerAssignment> = assignments
                .iter()
                .filter(|a| a.assigned_feeder_id == feeder.feeder_id)
                .cloned()
                .collect();
            suggestions
                .iter()
                .filter(|mv| mv.feeder_id == feeder.feeder_id)
                .any(|mv| {
                    working = apply_moves(&working, std::slice::from_ref(mv)).0;
                    aggregate_phase_loads(&working, loads, config)
                        .first()
                        .is_some_and(|f| imbalance_ratio(f.real_kw()) <= threshold)
                })
        })
        .count()
}

/// Balanced feeders count 1, imbalanced feeders with a proposal 0.7; the
/// sum is floored.
fn heuristic_balanced_estimate(feeders: &[FeederLoads], suggestions: &[BalancingMove], threshold: f64) -> usize {
    let improvable: HashSet<&FeederId> = suggestions.iter().map(|s| &s.feeder_id).collect();
    let score: f64 = feeders
        .iter()
        .map(|f| {
            if imbalance_ratio(f.real_kw()) <= threshold {
                1.0
            } else if improvable.contains(&f.feeder_id) {
                0.7
            } else {
                0.0
            }
        })
        .sum();
    score.floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{assignment, loads_of};

    fn skewed() -> (Vec<CustomerAssignment>, LoadTable) {
        let assignments = vec![
            assignment("A1", "F1", &[Phase::A]),
            assignment("B1", "F1", &[Phase::B]),
            assignment("C1", "F1", &[Phase::C]),
            assignment("C2", "F1", &[Phase::C]),
            assignment("C3", "F1", &[Phase::C]),
        ];
        let loads = loads_of(&[
            ("A1", 10.0, None),
            ("B1", 10.0, None),
            ("C1", 15.0, None),
            ("C2", 15.0, None),
            ("C3", 10.0, None),
        ]);
        (assignments, loads)
    }

    #[test]
    fn greedy_moves_off_heaviest_phase_in_order() {
        let (assignments, loads) = skewed();
        let config = AnalysisConfig::default();
        let feeders = aggregate_phase_loads(&assignments, &loads, &config);
        let per_customer = customer_loads(&assignments, &loads, &config);
        let moves = GreedyMoves.propose(&feeders[0], &per_customer, &config.balancing);

        let ids: Vec<_> = moves.iter().map(|m| m.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["C1", "C2", "C3"]);
        assert!(moves.iter().all(|m| m.from_phase == Phase::C));
        // A and B tie at 10 kW; the stable order makes B the least loaded.
        assert!(moves.iter().all(|m| m.to_phase == Phase::B));
        let first = moves[0].expected_improvement;
        assert_eq!(first.imbalance_before, 1.0);
        assert!((first.imbalance_after - 0.5).abs() < 1e-12);
    }

    #[test]
    fn small_gap_proposes_nothing() {
        let assignments = vec![
            assignment("A1", "F1", &[Phase::A]),
            assignment("B1", "F1", &[Phase::B]),
            assignment("C1", "F1", &[Phase::C]),
        ];
        let loads = loads_of(&[("A1", 10.0, None), ("B1", 10.0, None), ("C1", 10.5, None)]);
        let config = AnalysisConfig::default();
        let feeders = aggregate_phase_loads(&assignments, &loads, &config);
        let per_customer = customer_loads(&assignments, &loads, &config);
        assert!(GreedyMoves
            .propose(&feeders[0], &per_customer, &config.balancing)
            .is_empty());
    }

    #[test]
    fn greedy_caps_and_dedupes_proposals() {
        let mut assignments: Vec<_> = (0..8)
            .map(|i| assignment(&format!("C{i}"), "F1", &[Phase::A]))
            .collect();
        // Wired twice to Phase A.
        assignments.insert(0, assignment("TWIN", "F1", &[Phase::A, Phase::A]));
        let loads = loads_of(&[("TWIN", 1.0, None)]);
        let config = AnalysisConfig::default();
        let feeders = aggregate_phase_loads(&assignments, &loads, &config);
        let per_customer = customer_loads(&assignments, &loads, &config);
        let moves = GreedyMoves.propose(&feeders[0], &per_customer, &config.balancing);
        assert_eq!(moves.len(), 5);
        assert_eq!(moves.iter().filter(|m| m.customer_id.as_str() == "TWIN").count(), 1);
    }

    #[test]
    fn exhaustive_finds_single_best_move() {
        let (assignments, loads) = skewed();
        let config = AnalysisConfig::default();
        let feeders = aggregate_phase_loads(&assignments, &loads, &config);
        let per_customer = customer_loads(&assignments, &loads, &config);
        let moves = ExhaustiveMoves { max_customers: 10 }.propose(&feeders[0], &per_customer, &config.balancing);

        let mut after = feeders[0].real_kw();
        for m in &moves {
            after[m.from_phase.index()] -= m.customer_load_kw.value();
            after[m.to_phase.index()] += m.customer_load_kw.value();
        }
        // Best reachable split of 60 kW is 20/25/15, two moves away.
        assert_eq!(moves.len(), 2);
        assert!((imbalance_ratio(after) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn heuristic_estimate_floors() {
        let (mut assignments, mut loads) = skewed();
        assignments.push(assignment("X1", "F2", &[Phase::A]));
        assignments.push(assignment("X2", "F2", &[Phase::B]));
        assignments.push(assignment("X3", "F2", &[Phase::C]));
        loads.extend(loads_of(&[("X1", 5.0, None), ("X2", 5.0, None), ("X3", 5.0, None)]));

        let mut config = AnalysisConfig::default();
        config.balancing.balanced_estimate = BalancedFeederEstimate::Heuristic;
        let heuristic = suggest_moves(&assignments, &loads, &config);
        // 1 (F2 balanced) + 0.7 (F1 improvable) floors to 1.
        assert_eq!(heuristic.estimated_balanced_feeders, 1);

        config.balancing.balanced_estimate = BalancedFeederEstimate::Simulated;
        let simulated = suggest_moves(&assignments, &loads, &config);
        assert_eq!(simulated.suggestions, heuristic.suggestions);
        assert!(simulated.estimated_balanced_feeders >= 1);
    }

    #[test]
    fn exhaustive_search_is_capped_without_config() {
        let assignments: Vec<_> = (0..40)
            .map(|i| assignment(&format!("C{i}"), "F1", &[Phase::C]))
            .collect();
        let config = AnalysisConfig::default();
        let feeders = aggregate_phase_loads(&assignments, &LoadTable::new(), &config);
        let per_customer = customer_loads(&assignments, &LoadTable::new(), &config);
        let exhaustive = ExhaustiveMoves { max_customers: 45 }.propose(&feeders[0], &per_customer, &config.balancing);
        let greedy = GreedyMoves.propose(&feeders[0], &per_customer, &config.balancing);
        assert_eq!(exhaustive, greedy);
    }

    #[test]
    fn proposals_are_sorted_by_reduction() {
        let (assignments, loads) = skewed();
        let out = suggest_moves(&assignments, &loads, &AnalysisConfig::default());
        assert_eq!(out.total_suggestions, out.suggestions.len());
        assert!(out
            .suggestions
            .windows(2)
            .all(|w| w[0].expected_improvement.imbalance_reduction
                >= w[1].expected_improvement.imbalance_reduction));
    }
}
