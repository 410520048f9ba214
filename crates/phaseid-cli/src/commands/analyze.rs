use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing::{info, warn};

use phaseid_cli::cli::AnalyzeArgs;
use phaseid_cli::config::resolve_config;
use phaseid_cli::input::{read_loads, read_meters, read_transformer};
use phaseid_cli::session::{AnalysisSession, SessionInputs, RESULTS_FILE};
use phaseid_core::{AnalysisConfig, Diagnostics, LoadTable};

use crate::commands::telemetry::RunTimer;

pub fn handle(args: &AnalyzeArgs) -> Result<()> {
    let timer = RunTimer::start(&args.session.session, "analyze");
    let res = analyze(args);

    let path_param = |p: &Option<PathBuf>| {
        p.as_ref()
            .map_or_else(|| "session".to_string(), |p| p.display().to_string())
    };
    let customers = path_param(&args.customers);
    let feeders = path_param(&args.feeders);
    let loads = path_param(&args.loads);
    let transformer = path_param(&args.transformer);
    let config = args
        .overrides
        .config
        .as_ref()
        .map_or_else(|| "default".to_string(), |p| p.display().to_string());
    timer.finish(
        RESULTS_FILE,
        &[
            ("customers", customers.as_str()),
            ("feeders", feeders.as_str()),
            ("loads", loads.as_str()),
            ("transformer", transformer.as_str()),
            ("config", config.as_str()),
        ],
        &res,
    );
    res
}

fn analyze(args: &AnalyzeArgs) -> Result<()> {
    let dir = args.session.session.as_path();
    let mut session = match (&args.customers, &args.feeders) {
        (Some(customers), Some(feeders)) => {
            let mut diag = Diagnostics::new();
            info!(
                "Reading customers from {} and feeders from {}",
                customers.display(),
                feeders.display()
            );
            let inputs = SessionInputs {
                customers: read_meters(customers, &mut diag)?,
                feeders: read_meters(feeders, &mut diag)?,
                loads: match &args.loads {
                    Some(path) => read_loads(path, &mut diag)?,
                    None => LoadTable::new(),
                },
                transformer: match &args.transformer {
                    Some(path) => read_transformer(path, &mut diag)?,
                    None => Vec::new(),
                },
                diagnostics: diag,
            };
            let config = resolve_config(AnalysisConfig::default(), &args.overrides)?;
            AnalysisSession::create(dir, config, inputs)?
        }
        (None, None) => {
            let mut session = AnalysisSession::open(dir)?;
            let config = resolve_config(session.config().clone(), &args.overrides)?;
            session.set_config(config)?;
            let mut diag = Diagnostics::new();
            if let Some(path) = &args.loads {
                session.set_loads(read_loads(path, &mut diag)?)?;
            }
            if let Some(path) = &args.transformer {
                session.set_transformer(read_transformer(path, &mut diag)?)?;
            }
            for issue in &diag.issues {
                warn!("{issue}");
            }
            session
        }
        _ => bail!("--customers and --feeders must be given together"),
    };

    let results = session.run()?;
    println!("{}", results.status_message());
    println!(
        "Matched {} of {} customers against {} feeders (resolver: {})",
        results.matched_count(),
        results.metadata.total_customers,
        results.metadata.total_feeders,
        results.metadata.resolver
    );
    for (feeder, customers) in results.by_feeder() {
        println!("  {feeder}: {} customers", customers.len());
    }
    if results.diagnostics.has_issues() {
        println!("{}", results.diagnostics.summary());
    }
    println!("Results written to {}", session.results_path().display());
    Ok(())
}
