use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use phaseid_balance::{
    aggregate_phase_loads, analyze_balance, phase_losses, simulate_top_moves, suggest_moves,
    LossReport,
};
use phaseid_cli::cli::BalanceCommands;
use phaseid_cli::session::AnalysisSession;
use phaseid_core::{AnalysisConfig, FeederId, MoveStrategyKind};

use crate::commands::telemetry::RunTimer;
use crate::commands::util::{output_label, write_output};

#[derive(Serialize)]
struct FeederLosses {
    feeder_id: FeederId,
    #[serde(flatten)]
    report: LossReport,
}

fn with_strategy(config: &AnalysisConfig, strategy: Option<&str>) -> Result<AnalysisConfig> {
    let mut config = config.clone();
    if let Some(strategy) = strategy {
        config.balancing.move_strategy = strategy.parse::<MoveStrategyKind>()?;
    }
    Ok(config)
}

pub fn handle(command: &BalanceCommands) -> Result<()> {
    match command {
        BalanceCommands::Analyze { session, out } => {
            let timer = RunTimer::start(&session.session, "balance analyze");
            let res = (|| -> Result<()> {
                let session = AnalysisSession::open(&session.session)?;
                let results = session.require_results()?;
                let analysis = analyze_balance(
                    &results.assignments,
                    &session.inputs().loads,
                    session.transformer(),
                    session.config(),
                );
                info!(
                    "{} of {} feeders imbalanced (threshold {:.0}%)",
                    analysis.imbalanced_feeders.len(),
                    analysis.total_feeders,
                    analysis.imbalance_threshold * 100.0
                );
                write_output(&analysis, out.as_deref(), "balance analysis")
            })();
            finish(timer, out.as_deref(), &[], res)
        }
        BalanceCommands::Suggest {
            session,
            strategy,
            out,
        } => {
            let timer = RunTimer::start(&session.session, "balance suggest");
            let res = (|| -> Result<()> {
                let session = AnalysisSession::open(&session.session)?;
                let results = session.require_results()?;
                let config = with_strategy(session.config(), strategy.as_deref())?;
                let suggestions =
                    suggest_moves(&results.assignments, &session.inputs().loads, &config);
                info!(
                    "{} moves proposed ({} strategy), {} feeders estimated balanced afterwards",
                    suggestions.total_suggestions,
                    suggestions.strategy,
                    suggestions.estimated_balanced_feeders
                );
                write_output(&suggestions, out.as_deref(), "suggestions")
            })();
            finish(
                timer,
                out.as_deref(),
                &[("strategy", strategy.as_deref().unwrap_or("config"))],
                res,
            )
        }
        BalanceCommands::Simulate {
            session,
            top,
            strategy,
            out,
        } => {
            let timer = RunTimer::start(&session.session, "balance simulate");
            let res = (|| -> Result<()> {
                let session = AnalysisSession::open(&session.session)?;
                let results = session.require_results()?;
                let mut config = with_strategy(session.config(), strategy.as_deref())?;
                if let Some(top) = top {
                    config.balancing.simulate_top_moves = *top;
                }
                let simulation =
                    simulate_top_moves(&results.assignments, &session.inputs().loads, &config);
                info!(
                    "Imbalance {:.3} -> {:.3} after {} moves (loss reduction {:.1}%)",
                    simulation.before.avg_imbalance,
                    simulation.after.avg_imbalance,
                    simulation.moves_applied,
                    simulation.improvements.loss_reduction_pct
                );
                write_output(&simulation, out.as_deref(), "simulation")
            })();
            let top = top.map_or_else(|| "config".to_string(), |t| t.to_string());
            finish(
                timer,
                out.as_deref(),
                &[
                    ("top", top.as_str()),
                    ("strategy", strategy.as_deref().unwrap_or("config")),
                ],
                res,
            )
        }
        BalanceCommands::Losses { session, out } => {
            let timer = RunTimer::start(&session.session, "balance losses");
            let res = (|| -> Result<()> {
                let session = AnalysisSession::open(&session.session)?;
                let results = session.require_results()?;
                let config = session.config();
                let losses: Vec<FeederLosses> =
                    aggregate_phase_loads(&results.assignments, &session.inputs().loads, config)
                        .iter()
                        .map(|feeder| FeederLosses {
                            feeder_id: feeder.feeder_id.clone(),
                            report: phase_losses(feeder, config.balancing.feeder_resistance_ohm),
                        })
                        .collect();
                write_output(&losses, out.as_deref(), "losses")
            })();
            finish(timer, out.as_deref(), &[], res)
        }
    }
}

fn finish(
    timer: RunTimer<'_>,
    out: Option<&Path>,
    params: &[(&str, &str)],
    res: Result<()>,
) -> Result<()> {
    timer.finish(&output_label(out), params, &res);
    res
}
