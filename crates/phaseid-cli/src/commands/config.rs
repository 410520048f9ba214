use std::path::Path;

use anyhow::Result;

use phaseid_cli::cli::ConfigCommands;
use phaseid_cli::config::{load_config_file, resolve_config, to_toml};
use phaseid_core::AnalysisConfig;

pub fn handle(command: &ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show { overrides } => {
            let config = resolve_config(AnalysisConfig::default(), overrides)?;
            print!("{}", to_toml(&config)?);
            Ok(())
        }
        ConfigCommands::Validate { path } => validate(path),
    }
}

fn validate(path: &Path) -> Result<()> {
    let config = load_config_file(path)?;
    config.validate()?;
    println!("{} is valid", path.display());
    Ok(())
}
