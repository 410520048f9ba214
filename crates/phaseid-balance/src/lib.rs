//! Phase-load balancing on top of a resolved assignment set.
//!
//! Everything here is recomputed from scratch on each call: loads are
//! aggregated per (feeder, phase), each feeder gets an imbalance ratio,
//! imbalanced feeders get move proposals, and the simulator applies
//! proposals to a copy of the assignments to report before/after figures.

pub mod aggregate;
pub mod imbalance;
pub mod losses;
pub mod optimizer;
pub mod simulator;
pub mod transformer;

pub use aggregate::{aggregate_phase_loads, customer_load, customer_loads, CustomerLoad, FeederLoads, PhaseLoad};
pub use imbalance::{analyze_balance, imbalance_ratio, BalanceAnalysis, ImbalanceReport};
pub use losses::{phase_losses, LossReport, PhaseLoss};
pub use optimizer::{
    build_move_strategy, suggest_moves, BalancingMove, ExhaustiveMoves, ExpectedImprovement,
    GreedyMoves, MoveStrategy, MoveSuggestions,
};
pub use simulator::{
    apply_moves, balance_stats, loss_reduction_pct, simulate_moves, simulate_top_moves,
    BalanceStats, SimulationImprovements, SimulationResult,
};
pub use transformer::{analyze_transformer, PhaseSummary, ThreePhaseStats, TransformerAnalysis, Utilization};
