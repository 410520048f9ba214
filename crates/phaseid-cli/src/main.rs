use clap::Parser;
use clap_complete::{generate, Shell};
use std::fs;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::FmtSubscriber;

use phaseid_cli::cli::{build_cli_command, Cli, Commands};

mod commands;

use crate::commands::{analyze, balance, config, corrections, runs, topology, trace};

fn generate_completions(shell: Shell, out: Option<&Path>) -> anyhow::Result<()> {
    let mut cmd = build_cli_command();
    if let Some(path) = out {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        generate(shell, &mut cmd, "phaseid", &mut file);
        println!("Wrote {shell:?} completion to {}", path.display());
    } else {
        generate(shell, &mut cmd, "phaseid", &mut io::stdout());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {err}");
    }

    let (label, result) = match &cli.command {
        Commands::Analyze(args) => ("Analyze", analyze::handle(args)),
        Commands::Topology {
            session,
            transformer,
            out,
        } => (
            "Topology",
            topology::handle(&session.session, transformer, out.as_deref()),
        ),
        Commands::Balance { command } => ("Balance", balance::handle(command)),
        Commands::Trace {
            session,
            customer,
            feeder,
            out,
        } => (
            "Trace",
            trace::handle(&session.session, customer, feeder.as_deref(), out.as_deref()),
        ),
        Commands::Corrections {
            session,
            customer,
            write_series,
            out,
        } => (
            "Corrections",
            corrections::handle(
                &session.session,
                customer.as_deref(),
                write_series.as_deref(),
                out.as_deref(),
            ),
        ),
        Commands::Config { command } => ("Config", config::handle(command)),
        Commands::Runs { command } => ("Runs", runs::handle(command)),
        Commands::Completions { shell, out } => {
            ("Completions", generate_completions(*shell, out.as_deref()))
        }
    };

    match result {
        Ok(()) => {
            info!("{label} command successful!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{label} command failed: {:?}", e);
            ExitCode::FAILURE
        }
    }
}
