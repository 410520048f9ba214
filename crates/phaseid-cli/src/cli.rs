use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Feeder/phase identification and phase-balance analysis", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Match customers to feeders and phases, replacing the session results
    Analyze(AnalyzeArgs),
    /// Build the transformer → feeder → phase → customer tree
    Topology {
        #[command(flatten)]
        session: SessionArgs,
        /// Label of the root transformer node
        #[arg(long, default_value = "Transformer")]
        transformer: String,
        /// Write JSON to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Phase-balance analysis on the current assignments
    Balance {
        #[command(subcommand)]
        command: BalanceCommands,
    },
    /// Aligned customer/feeder voltage pairs for one customer
    Trace {
        #[command(flatten)]
        session: SessionArgs,
        /// Customer meter id
        #[arg(long)]
        customer: String,
        /// Feeder meter id (defaults to the assigned feeder)
        #[arg(long)]
        feeder: Option<String>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Phase relabels implied by the current assignments
    Corrections {
        #[command(flatten)]
        session: SessionArgs,
        /// Only report this customer
        #[arg(long)]
        customer: Option<String>,
        /// Also write relabelled customer series as CSV
        #[arg(long)]
        write_series: Option<PathBuf>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Inspect analysis configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Run management
    Runs {
        #[command(subcommand)]
        command: RunsCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
        /// Write output to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Session directory holding inputs, results and run manifests
    #[arg(long, default_value = "phaseid-session")]
    pub session: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    /// Customer voltage series (meter_id,phase,timestamp,voltage)
    #[arg(long)]
    pub customers: Option<PathBuf>,
    /// Feeder voltage series (meter_id,phase,timestamp,voltage)
    #[arg(long)]
    pub feeders: Option<PathBuf>,
    /// Customer power readings (customer_id,real_kw,reactive_kvar,voltage)
    #[arg(long)]
    pub loads: Option<PathBuf>,
    /// Transformer telemetry CSV
    #[arg(long)]
    pub transformer: Option<PathBuf>,
    #[command(flatten)]
    pub overrides: ConfigOverrides,
}

/// Flags layered on top of the TOML config.
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// TOML file with an `AnalysisConfig`
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Alignment tolerance in minutes
    #[arg(long)]
    pub tolerance_minutes: Option<f64>,
    /// Minimum aligned pairs for a candidate to count
    #[arg(long)]
    pub min_aligned_points: Option<usize>,
    /// Nominal voltage used to normalize RMSE
    #[arg(long)]
    pub nominal_voltage: Option<f64>,
    /// Phase resolver (greedy, optimal)
    #[arg(long)]
    pub resolver: Option<String>,
    /// Worker threads for matching (0 = one per CPU)
    #[arg(long)]
    pub threads: Option<usize>,
    /// Imbalance ratio at or below which a feeder counts as balanced
    #[arg(long)]
    pub imbalance_threshold: Option<f64>,
    /// Maximum balancing moves proposed per feeder
    #[arg(long)]
    pub max_moves: Option<usize>,
    /// Move search strategy (greedy, exhaustive)
    #[arg(long)]
    pub strategy: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum BalanceCommands {
    /// Per-feeder imbalance reports and transformer load summary
    Analyze {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Propose customer phase moves for imbalanced feeders
    Suggest {
        #[command(flatten)]
        session: SessionArgs,
        /// Move search strategy (greedy, exhaustive)
        #[arg(long)]
        strategy: Option<String>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Apply the top suggestions to a copy and compare before/after
    Simulate {
        #[command(flatten)]
        session: SessionArgs,
        /// Number of top-ranked suggestions to apply
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        strategy: Option<String>,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Estimated resistive losses per feeder phase
    Losses {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show {
        #[command(flatten)]
        overrides: ConfigOverrides,
    },
    /// Validate a configuration file
    Validate {
        /// TOML file to check
        path: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
pub enum RunsCommands {
    /// List recorded runs of every session below a root
    List {
        /// Session directory, or a directory holding several sessions
        #[arg(long, default_value = ".")]
        root: PathBuf,
        /// Output format for the listing
        #[arg(long, value_enum, default_value_t = RunFormat::Plain)]
        format: RunFormat,
    },
    /// Describe a recorded run
    Describe {
        /// Manifest path, run id, or `run-<id>` file name
        target: String,
        /// Where sessions are looked for when target is not a path
        #[arg(long, default_value = ".")]
        root: PathBuf,
        #[arg(long, value_enum, default_value_t = RunFormat::Plain)]
        format: RunFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunFormat {
    Plain,
    Json,
}

pub fn build_cli_command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        build_cli_command().debug_assert();
    }

    #[test]
    fn analyze_flags_parse() {
        let cli = Cli::try_parse_from([
            "phaseid",
            "analyze",
            "--session",
            "s",
            "--customers",
            "c.csv",
            "--feeders",
            "f.csv",
            "--tolerance-minutes",
            "5",
            "--resolver",
            "optimal",
        ])
        .unwrap();
        let Commands::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.session.session, PathBuf::from("s"));
        assert_eq!(args.overrides.tolerance_minutes, Some(5.0));
        assert_eq!(args.overrides.resolver.as_deref(), Some("optimal"));
        assert!(args.loads.is_none());
    }
}
