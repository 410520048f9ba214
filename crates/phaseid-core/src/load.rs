//! Per-customer power readings and transformer telemetry consumed by the
//! balancing analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::CustomerId;

/// One power/voltage reading from a customer meter. Any field may be
/// missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadSample {
    #[serde(default)]
    pub real_kw: Option<f64>,
    #[serde(default)]
    pub reactive_kvar: Option<f64>,
    #[serde(default)]
    pub voltage: Option<f64>,
}

/// All power readings of one customer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerLoadProfile {
    pub samples: Vec<LoadSample>,
}

impl CustomerLoadProfile {
    pub fn new(samples: Vec<LoadSample>) -> Self {
        Self { samples }
    }

    /// Profile with a single constant reading; handy for what-if inputs.
    pub fn constant(real_kw: f64, reactive_kvar: f64) -> Self {
        Self::new(vec![LoadSample {
            real_kw: Some(real_kw),
            reactive_kvar: Some(reactive_kvar),
            voltage: None,
        }])
    }

    pub fn mean_real_kw(&self) -> Option<f64> {
        finite_mean(self.samples.iter().filter_map(|s| s.real_kw))
    }

    pub fn mean_reactive_kvar(&self) -> Option<f64> {
        finite_mean(self.samples.iter().filter_map(|s| s.reactive_kvar))
    }

    pub fn mean_voltage(&self) -> Option<f64> {
        finite_mean(self.samples.iter().filter_map(|s| s.voltage))
    }
}

/// Load profiles keyed by customer.
pub type LoadTable = HashMap<CustomerId, CustomerLoadProfile>;

/// One row of transformer telemetry. Columns the source did not provide
/// stay `None`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformerSample {
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub current: [Option<f64>; 3],
    #[serde(default)]
    pub voltage: [Option<f64>; 3],
    #[serde(default)]
    pub import_kw: Option<f64>,
    #[serde(default)]
    pub import_kva: Option<f64>,
    #[serde(default)]
    pub power_factor: Option<f64>,
}

fn finite_mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}
