//! Effective `AnalysisConfig`: defaults, then the TOML file, then flags.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use phaseid_core::{AnalysisConfig, MoveStrategyKind, ResolverKind};

use crate::cli::ConfigOverrides;

pub fn load_config_file(path: &Path) -> Result<AnalysisConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: AnalysisConfig =
        toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?;
    Ok(config)
}

/// Apply `overrides` on top of `base` (or the config file they name) and
/// validate the result.
pub fn resolve_config(base: AnalysisConfig, overrides: &ConfigOverrides) -> Result<AnalysisConfig> {
    let mut config = match &overrides.config {
        Some(path) => load_config_file(path)?,
        None => base,
    };
    if let Some(minutes) = overrides.tolerance_minutes {
        config.matching.tolerance_minutes = minutes;
    }
    if let Some(points) = overrides.min_aligned_points {
        config.matching.min_aligned_points = points;
    }
    if let Some(voltage) = overrides.nominal_voltage {
        config.nominal_voltage = voltage;
    }
    if let Some(resolver) = &overrides.resolver {
        config.matching.resolver = resolver.parse::<ResolverKind>()?;
    }
    if let Some(threads) = overrides.threads {
        config.threads = threads;
    }
    if let Some(threshold) = overrides.imbalance_threshold {
        config.balancing.imbalance_threshold = threshold;
    }
    if let Some(max_moves) = overrides.max_moves {
        config.balancing.max_moves_per_feeder = max_moves;
    }
    if let Some(strategy) = &overrides.strategy {
        config.balancing.move_strategy = strategy.parse::<MoveStrategyKind>()?;
    }
    config.validate().context("invalid analysis configuration")?;
    Ok(config)
}

pub fn to_toml(config: &AnalysisConfig) -> Result<String> {
    toml::to_string_pretty(config).context("serializing config to TOML")
}
