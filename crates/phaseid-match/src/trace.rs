//! Aligned voltage pairs of a customer and a feeder, for plotting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use phaseid_core::{AnalysisConfig, CustomerId, CustomerMeter, FeederId, FeederMeter, MatchMetrics, Phase};
use phaseid_ts::{align, metrics_for_pairs, CleanSeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub customer_time: DateTime<Utc>,
    pub feeder_time: DateTime<Utc>,
    pub customer_voltage: f64,
    pub feeder_voltage: f64,
    pub offset_minutes: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedTrace {
    pub customer_id: CustomerId,
    pub feeder_id: FeederId,
    pub customer_phase: Phase,
    pub feeder_phase: Phase,
    #[serde(flatten)]
    pub metrics: MatchMetrics,
    pub points: Vec<TracePoint>,
}

/// Align the primary phases of `customer` and `feeder`. `None` when either
/// meter has no series or too few samples pair up.
pub fn aligned_trace(
    customer: &CustomerMeter,
    feeder: &FeederMeter,
    config: &AnalysisConfig,
) -> Option<AlignedTrace> {
    let customer_series = customer.primary()?;
    let feeder_series = feeder.primary()?;
    let pairs = align(
        &CleanSeries::from_samples(&customer_series.samples),
        &CleanSeries::from_samples(&feeder_series.samples),
        config.matching.tolerance(),
    );
    let metrics = metrics_for_pairs(&pairs, config)?;
    let points = pairs
        .iter()
        .map(|p| TracePoint {
            customer_time: p.customer_time,
            feeder_time: p.feeder_time,
            customer_voltage: p.customer_voltage,
            feeder_voltage: p.feeder_voltage,
            offset_minutes: p.offset().num_milliseconds() as f64 / 60_000.0,
        })
        .collect();
    Some(AlignedTrace {
        customer_id: customer.id.clone(),
        feeder_id: feeder.id.clone(),
        customer_phase: customer_series.phase,
        feeder_phase: feeder_series.phase,
        metrics,
        points,
    })
}
