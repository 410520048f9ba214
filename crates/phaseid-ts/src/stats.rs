//! Similarity and descriptive statistics over plain `f64` slices.

use serde::{Deserialize, Serialize};

/// Pearson correlation coefficient.
///
/// Returns 0.0 for fewer than two pairs or when either side is constant.
pub fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return 0.0;
    }
    let (xs, ys) = (&xs[..n], &ys[..n]);
    let mean_x = mean(xs);
    let mean_y = mean(ys);
    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= 0.0 || var_y <= 0.0 {
        return 0.0;
    }
    let r = cov / (var_x.sqrt() * var_y.sqrt());
    if r.is_finite() {
        r.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

/// Root-mean-square difference. 0.0 for empty input.
pub fn rmse(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return 0.0;
    }
    let sum_sq: f64 = xs.iter().zip(ys).map(|(x, y)| (x - y).powi(2)).sum();
    (sum_sq / n as f64).sqrt()
}

/// Composite ranking score: `|r| - rmse_weight * rmse / nominal_voltage`.
pub fn match_score(correlation: f64, rmse: f64, rmse_weight: f64, nominal_voltage: f64) -> f64 {
    correlation.abs() - rmse_weight * (rmse / nominal_voltage)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean, extremes and sample standard deviation of a set of readings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub max: f64,
    pub min: f64,
    pub std: f64,
    pub count: usize,
}

impl Summary {
    /// Summarize the finite values; `None` when there are none. A single
    /// value has a standard deviation of 0.
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Option<Self> {
        let finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let count = finite.len();
        let mean = mean(&finite);
        let max = finite.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = finite.iter().copied().fold(f64::INFINITY, f64::min);
        let std = if count > 1 {
            let ss: f64 = finite.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Some(Self {
            mean,
            max,
            min,
            std,
            count,
        })
    }
}

/// Relative deviation of the furthest value from the mean:
/// `max(|v - mean|) / mean`. `None` when the mean is not positive.
pub fn max_deviation_ratio(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let m = mean(values);
    if m <= 0.0 {
        return None;
    }
    let max_dev = values.iter().map(|v| (v - m).abs()).fold(0.0, f64::max);
    Some(max_dev / m)
}
