use phaseid_balance::{
    aggregate_phase_loads, analyze_balance, customer_loads, imbalance_ratio, simulate_moves,
    suggest_moves, ExhaustiveMoves, GreedyMoves, MoveStrategy,
};
use phaseid_core::{
    AnalysisConfig, CustomerAssignment, CustomerId, CustomerLoadProfile, FeederId, LoadTable,
    MatchMetrics, MoveStrategyKind, Phase, PhaseAssignment,
};

fn metrics() -> MatchMetrics {
    MatchMetrics {
        correlation: 0.95,
        rmse: 0.8,
        score: 0.95,
        aligned_points: 96,
    }
}

fn on_phase(customer: &str, feeder: &str, phase: Phase) -> CustomerAssignment {
    CustomerAssignment {
        customer_id: CustomerId::new(customer),
        assigned_feeder_id: FeederId::new(feeder),
        metrics: metrics(),
        phase_assignments: vec![PhaseAssignment {
            customer_phase: Phase::A,
            assigned_feeder_phase: phase,
            metrics: metrics(),
        }],
        phase_matches: Vec::new(),
    }
}

/// Eight customers on F1: 10 kW on A, 10 kW on B, 40 kW on C.
fn ten_ten_forty() -> (Vec<CustomerAssignment>, LoadTable) {
    let mut assignments = Vec::new();
    let mut loads = LoadTable::new();
    let customers: [(&str, Phase, f64); 8] = [
        ("A1", Phase::A, 5.0),
        ("A2", Phase::A, 5.0),
        ("B1", Phase::B, 10.0),
        ("C1", Phase::C, 12.0),
        ("C2", Phase::C, 8.0),
        ("C3", Phase::C, 6.0),
        ("C4", Phase::C, 9.0),
        ("C5", Phase::C, 5.0),
    ];
    for (id, phase, kw) in customers {
        assignments.push(on_phase(id, "F1", phase));
        loads.insert(CustomerId::new(id), CustomerLoadProfile::constant(kw, 1.0));
    }
    (assignments, loads)
}

#[test]
fn skewed_feeder_is_imbalanced_and_moves_leave_heavy_phase() {
    let (assignments, loads) = ten_ten_forty();
    let config = AnalysisConfig::default();

    let analysis = analyze_balance(&assignments, &loads, None, &config);
    assert_eq!(analysis.feeders.len(), 1);
    assert_eq!(analysis.feeders[0].imbalance_ratio, 1.0);
    assert_eq!(analysis.imbalanced_feeders, vec![FeederId::new("F1")]);

    let out = suggest_moves(&assignments, &loads, &config);
    assert!(!out.suggestions.is_empty());
    assert!(out.suggestions.len() <= config.balancing.max_moves_per_feeder);
    for mv in &out.suggestions {
        assert_eq!(mv.from_phase, Phase::C);
        assert_ne!(mv.to_phase, Phase::C);
        assert_eq!(mv.feeder_id.as_str(), "F1");
    }
}

#[test]
fn every_greedy_move_narrows_the_gap() {
    let (assignments, loads) = ten_ten_forty();
    let config = AnalysisConfig::default();
    let feeders = aggregate_phase_loads(&assignments, &loads, &config);
    let per_customer = customer_loads(&assignments, &loads, &config);
    let loads_kw = feeders[0].real_kw();

    let moves = GreedyMoves.propose(&feeders[0], &per_customer, &config.balancing);
    assert!(!moves.is_empty());
    for mv in &moves {
        let m = loads_kw[mv.from_phase.index()];
        let l = loads_kw[mv.to_phase.index()];
        let kw = mv.customer_load_kw.value();
        assert!(((m - kw) - (l + kw)).abs() < (m - l).abs(), "{}", mv.customer_id);
    }
}

#[test]
fn exhaustive_never_ends_worse_than_greedy() {
    let (assignments, loads) = ten_ten_forty();
    let config = AnalysisConfig::default();
    let feeders = aggregate_phase_loads(&assignments, &loads, &config);
    let per_customer = customer_loads(&assignments, &loads, &config);

    let greedy = GreedyMoves.propose(&feeders[0], &per_customer, &config.balancing);
    let exhaustive =
        ExhaustiveMoves { max_customers: 10 }.propose(&feeders[0], &per_customer, &config.balancing);

    let after_greedy = simulate_moves(&assignments, &greedy, &loads, &config).after;
    let after_exhaustive = simulate_moves(&assignments, &exhaustive, &loads, &config).after;
    assert!(after_exhaustive.avg_imbalance <= after_greedy.avg_imbalance + 1e-9);
    assert!(after_exhaustive.avg_imbalance < 1.0);
}

#[test]
fn exhaustive_strategy_is_selected_by_config() {
    let (assignments, loads) = ten_ten_forty();
    let mut config = AnalysisConfig::default();
    config.balancing.move_strategy = MoveStrategyKind::Exhaustive;
    let out = suggest_moves(&assignments, &loads, &config);
    assert_eq!(out.strategy, "exhaustive");

    let result = simulate_moves(&assignments, &out.suggestions, &loads, &config);
    assert!(result.after.avg_imbalance <= config.balancing.imbalance_threshold);
    assert_eq!(out.estimated_balanced_feeders, 1);
}

#[test]
fn balanced_feeders_get_no_suggestions() {
    let assignments = vec![
        on_phase("A1", "F1", Phase::A),
        on_phase("B1", "F1", Phase::B),
        on_phase("C1", "F1", Phase::C),
    ];
    let out = suggest_moves(&assignments, &LoadTable::new(), &AnalysisConfig::default());
    assert!(out.suggestions.is_empty());
    assert_eq!(out.estimated_balanced_feeders, 1);
    assert_eq!(imbalance_ratio([5.0, 5.0, 5.0]), 0.0);
}

#[test]
fn empty_assignment_set_is_normal_input() {
    let config = AnalysisConfig::default();
    let analysis = analyze_balance(&[], &LoadTable::new(), None, &config);
    assert_eq!(analysis.total_feeders, 0);
    let out = suggest_moves(&[], &LoadTable::new(), &config);
    assert_eq!(out.total_suggestions, 0);
    let sim = simulate_moves(&[], &[], &LoadTable::new(), &config);
    assert_eq!(sim.before.avg_imbalance, 0.0);
    assert_eq!(sim.before.avg_voltage, config.nominal_voltage);
}

#[test]
fn one_balancing_move_counts_feeder_as_balanced() {
    // 20 kW on A, 20 kW on B, six 5 kW customers on C.
    let mut assignments = vec![on_phase("A1", "F1", Phase::A), on_phase("B1", "F1", Phase::B)];
    let mut loads = LoadTable::new();
    loads.insert(CustomerId::new("A1"), CustomerLoadProfile::constant(20.0, 1.0));
    loads.insert(CustomerId::new("B1"), CustomerLoadProfile::constant(20.0, 1.0));
    for i in 1..=6 {
        let id = format!("C{i}");
        assignments.push(on_phase(&id, "F1", Phase::C));
        loads.insert(CustomerId::new(id.as_str()), CustomerLoadProfile::constant(5.0, 1.0));
    }
    let config = AnalysisConfig::default();

    let out = suggest_moves(&assignments, &loads, &config);
    assert!(out.suggestions.len() > 1);
    let single = simulate_moves(&assignments, &out.suggestions[..1], &loads, &config);
    assert!(single.after.avg_imbalance <= config.balancing.imbalance_threshold);
    assert_eq!(single.after.balanced_feeders, 1);
    assert_eq!(out.estimated_balanced_feeders, 1);
}
