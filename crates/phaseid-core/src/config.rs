//! Tunable constants for matching and balancing.
//!
//! Every field has a serde default so a TOML file only needs to name what
//! it overrides. [`AnalysisConfig::validate`] must be called at the boundary
//! before handing the config to the analysis crates; they assume it holds.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{PhaseIdError, PhaseIdResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Nominal RMS voltage (V) used to normalize RMSE and as the fallback
    /// phase voltage.
    #[serde(default = "default_nominal_voltage")]
    pub nominal_voltage: f64,
    /// Worker threads for per-customer matching (0 = one per CPU).
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub balancing: BalancingConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            nominal_voltage: default_nominal_voltage(),
            threads: 0,
            matching: MatchingConfig::default(),
            balancing: BalancingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Maximum timestamp offset (minutes) for two samples to pair up.
    #[serde(default = "default_tolerance_minutes")]
    pub tolerance_minutes: f64,
    /// Candidates with fewer aligned pairs are discarded.
    #[serde(default = "default_min_aligned_points")]
    pub min_aligned_points: usize,
    /// Weight of the normalized RMSE penalty in the match score.
    #[serde(default = "default_rmse_weight")]
    pub rmse_weight: f64,
    #[serde(default)]
    pub resolver: ResolverKind,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tolerance_minutes: default_tolerance_minutes(),
            min_aligned_points: default_min_aligned_points(),
            rmse_weight: default_rmse_weight(),
            resolver: ResolverKind::default(),
        }
    }
}

impl MatchingConfig {
    pub fn tolerance(&self) -> TimeDelta {
        let millis = (self.tolerance_minutes * 60_000.0).round() as i64;
        TimeDelta::try_milliseconds(millis).unwrap_or(TimeDelta::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancingConfig {
    /// A feeder is balanced when its imbalance ratio is at or below this.
    #[serde(default = "default_imbalance_threshold")]
    pub imbalance_threshold: f64,
    #[serde(default = "default_max_moves_per_feeder")]
    pub max_moves_per_feeder: usize,
    /// No moves are proposed when `max - min < min_gap_ratio * max`.
    #[serde(default = "default_min_gap_ratio")]
    pub min_gap_ratio: f64,
    #[serde(default)]
    pub default_load: DefaultLoad,
    /// Moves simulated when the caller does not pick any.
    #[serde(default = "default_simulate_top_moves")]
    pub simulate_top_moves: usize,
    #[serde(default = "default_feeder_resistance_ohm")]
    pub feeder_resistance_ohm: f64,
    #[serde(default = "default_transformer_capacity_kva")]
    pub transformer_capacity_kva: f64,
    #[serde(default)]
    pub move_strategy: MoveStrategyKind,
    /// Upper bound on memberships searched by the exhaustive strategy, at
    /// most [`EXHAUSTIVE_CUSTOMER_LIMIT`].
    #[serde(default = "default_exhaustive_max_customers")]
    pub exhaustive_max_customers: usize,
    #[serde(default)]
    pub balanced_estimate: BalancedFeederEstimate,
}

impl Default for BalancingConfig {
    fn default() -> Self {
        Self {
            imbalance_threshold: default_imbalance_threshold(),
            max_moves_per_feeder: default_max_moves_per_feeder(),
            min_gap_ratio: default_min_gap_ratio(),
            default_load: DefaultLoad::default(),
            simulate_top_moves: default_simulate_top_moves(),
            feeder_resistance_ohm: default_feeder_resistance_ohm(),
            transformer_capacity_kva: default_transformer_capacity_kva(),
            move_strategy: MoveStrategyKind::default(),
            exhaustive_max_customers: default_exhaustive_max_customers(),
            balanced_estimate: BalancedFeederEstimate::default(),
        }
    }
}

/// Placeholder load for customers without power readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DefaultLoad {
    #[serde(default = "default_real_kw")]
    pub real_kw: f64,
    #[serde(default = "default_reactive_kvar")]
    pub reactive_kvar: f64,
}

impl Default for DefaultLoad {
    fn default() -> Self {
        Self {
            real_kw: default_real_kw(),
            reactive_kvar: default_reactive_kvar(),
        }
    }
}

/// How a customer's phase score matrix becomes phase assignments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Per-row argmax; feeder phases may repeat within one customer.
    #[default]
    Greedy,
    /// Best total score under a strict one-to-one mapping.
    Optimal,
}

/// How balancing moves are searched for an imbalanced feeder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStrategyKind {
    /// Bounded greedy pass over the most loaded phase.
    #[default]
    Greedy,
    /// Enumerate every placement of the feeder's customers (small feeders only).
    Exhaustive,
}

/// How the "feeders balanced after applying suggestions" figure is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalancedFeederEstimate {
    /// Balanced feeders count 1, improvable feeders 0.7, floored.
    Heuristic,
    /// Apply all proposed moves in the simulator and count.
    #[default]
    Simulated,
}

macro_rules! impl_kind_str {
    ($type:ident, $what:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $type {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($type::$variant => $name,)+
                }
            }

            pub fn available() -> &'static [&'static str] {
                &[$($name),+]
            }
        }

        impl FromStr for $type {
            type Err = PhaseIdError;

            fn from_str(input: &str) -> Result<Self, Self::Err> {
                match input.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok($type::$variant),)+
                    other => Err(PhaseIdError::Config(format!(
                        "unknown {} '{}'; supported values: {}",
                        $what,
                        other,
                        $type::available().join(", ")
                    ))),
                }
            }
        }
    };
}

/// The exhaustive move search visits `3^n` placements for `n` customers.
pub const EXHAUSTIVE_CUSTOMER_LIMIT: usize = 15;

impl_kind_str!(ResolverKind, "resolver", { Greedy => "greedy", Optimal => "optimal" });
impl_kind_str!(MoveStrategyKind, "move strategy", { Greedy => "greedy", Exhaustive => "exhaustive" });
impl_kind_str!(BalancedFeederEstimate, "balanced-feeder estimate", {
    Heuristic => "heuristic",
    Simulated => "simulated",
});

impl AnalysisConfig {
    /// Reject configurations the analysis cannot run with.
    pub fn validate(&self) -> PhaseIdResult<()> {
        let m = &self.matching;
        let b = &self.balancing;
        if !self.nominal_voltage.is_finite() || self.nominal_voltage <= 0.0 {
            return Err(config_err(format!(
                "nominal_voltage must be positive, got {}",
                self.nominal_voltage
            )));
        }
        if !m.tolerance_minutes.is_finite() || m.tolerance_minutes < 0.0 {
            return Err(config_err(format!(
                "tolerance_minutes must be a non-negative number, got {}",
                m.tolerance_minutes
            )));
        }
        if m.min_aligned_points < 2 {
            return Err(config_err(format!(
                "min_aligned_points must be at least 2 for a correlation, got {}",
                m.min_aligned_points
            )));
        }
        if !m.rmse_weight.is_finite() || m.rmse_weight < 0.0 {
            return Err(config_err(format!(
                "rmse_weight must be non-negative, got {}",
                m.rmse_weight
            )));
        }
        if !b.imbalance_threshold.is_finite() || b.imbalance_threshold < 0.0 {
            return Err(config_err(format!(
                "imbalance_threshold must be non-negative, got {}",
                b.imbalance_threshold
            )));
        }
        if b.max_moves_per_feeder == 0 {
            return Err(config_err("max_moves_per_feeder must be at least 1".into()));
        }
        if b.exhaustive_max_customers > EXHAUSTIVE_CUSTOMER_LIMIT {
            return Err(config_err(format!(
                "exhaustive_max_customers must be at most {EXHAUSTIVE_CUSTOMER_LIMIT}, got {}",
                b.exhaustive_max_customers
            )));
        }
        if !b.min_gap_ratio.is_finite() || !(0.0..=1.0).contains(&b.min_gap_ratio) {
            return Err(config_err(format!(
                "min_gap_ratio must lie in [0, 1], got {}",
                b.min_gap_ratio
            )));
        }
        let load = &b.default_load;
        if !load.real_kw.is_finite()
            || load.real_kw < 0.0
            || !load.reactive_kvar.is_finite()
            || load.reactive_kvar < 0.0
        {
            return Err(config_err(format!(
                "default_load must be non-negative, got {} kW / {} kvar",
                load.real_kw, load.reactive_kvar
            )));
        }
        if !b.feeder_resistance_ohm.is_finite() || b.feeder_resistance_ohm <= 0.0 {
            return Err(config_err(format!(
                "feeder_resistance_ohm must be positive, got {}",
                b.feeder_resistance_ohm
            )));
        }
        if !b.transformer_capacity_kva.is_finite() || b.transformer_capacity_kva <= 0.0 {
            return Err(config_err(format!(
                "transformer_capacity_kva must be positive, got {}",
                b.transformer_capacity_kva
            )));
        }
        Ok(())
    }
}

fn config_err(message: String) -> PhaseIdError {
    PhaseIdError::Config(message)
}

fn default_nominal_voltage() -> f64 {
    230.0
}

fn default_tolerance_minutes() -> f64 {
    15.0
}

fn default_min_aligned_points() -> usize {
    10
}

fn default_rmse_weight() -> f64 {
    0.5
}

fn default_imbalance_threshold() -> f64 {
    0.15
}

fn default_max_moves_per_feeder() -> usize {
    5
}

fn default_min_gap_ratio() -> f64 {
    0.1
}

fn default_simulate_top_moves() -> usize {
    5
}

fn default_feeder_resistance_ohm() -> f64 {
    0.5
}

fn default_transformer_capacity_kva() -> f64 {
    100.0
}

fn default_exhaustive_max_customers() -> usize {
    10
}

fn default_real_kw() -> f64 {
    5.0
}

fn default_reactive_kvar() -> f64 {
    1.0
}
