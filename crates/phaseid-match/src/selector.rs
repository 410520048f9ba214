//! Feeder candidate selection on primary-phase series.

use serde::{Deserialize, Serialize};
use tracing::debug;

use phaseid_core::{AnalysisConfig, CustomerId, FeederId, FeederMatch};
use phaseid_ts::{compare, CleanSeries};

use crate::prepared::PreparedMeter;

/// Every candidate that reached the minimum aligned points, in feeder input
/// order, plus the index of the winner.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeederSelection {
    pub candidates: Vec<FeederMatch>,
    best: Option<usize>,
}

impl FeederSelection {
    pub fn best(&self) -> Option<&FeederMatch> {
        self.best.and_then(|i| self.candidates.get(i))
    }

    pub fn into_best(mut self) -> Option<FeederMatch> {
        self.best.map(|i| self.candidates.swap_remove(i))
    }
}

/// Score `customer` against each feeder's primary series and keep the
/// highest score. Ties go to the feeder listed first.
pub fn select_feeder(
    customer_id: &CustomerId,
    customer: &CleanSeries,
    feeders: &[PreparedMeter<FeederId>],
    config: &AnalysisConfig,
) -> FeederSelection {
    let mut selection = FeederSelection::default();
    let mut best_score = f64::NEG_INFINITY;
    for feeder in feeders {
        let Some((_, feeder_series)) = feeder.primary() else {
            continue;
        };
        let Some(metrics) = compare(customer, feeder_series, config) else {
            debug!(
                customer = %customer_id,
                feeder = %feeder.id,
                "candidate below minimum aligned points"
            );
            continue;
        };
        debug!(
            customer = %customer_id,
            feeder = %feeder.id,
            correlation = metrics.correlation,
            rmse = metrics.rmse,
            score = metrics.score,
            "feeder candidate"
        );
        if selection.best.is_none() || metrics.score > best_score {
            best_score = metrics.score;
            selection.best = Some(selection.candidates.len());
        }
        selection.candidates.push(FeederMatch {
            feeder_id: feeder.id.clone(),
            metrics,
        });
    }
    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use phaseid_core::{Meter, Phase, Sample};

    fn samples(values: &[f64]) -> Vec<Sample> {
        let start: DateTime<Utc> = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample::new(start + TimeDelta::minutes(15 * i as i64), *v))
            .collect()
    }

    fn feeder(id: &str, values: &[f64]) -> PreparedMeter<FeederId> {
        PreparedMeter::from_meter(&Meter::new(FeederId::new(id)).with_phase(Phase::A, samples(values)))
    }

    #[test]
    fn picks_the_identical_feeder() {
        let profile = [230.0, 231.0, 229.0, 230.0, 232.0].repeat(2);
        let noisy = [210.0, 400.0, 150.0, 300.0, 100.0].repeat(2);
        let feeders = vec![feeder("F_B", &noisy), feeder("F_A", &profile)];
        let customer = CleanSeries::from_samples(&samples(&profile));

        let selection = select_feeder(&CustomerId::new("C1"), &customer, &feeders, &AnalysisConfig::default());
        assert_eq!(selection.candidates.len(), 2);
        let best = selection.best().unwrap();
        assert_eq!(best.feeder_id.as_str(), "F_A");
        assert!((best.metrics.score - 1.0).abs() < 1e-12);
    }

    #[test]
    fn ties_go_to_input_order() {
        let profile = [230.0, 231.0, 229.0, 230.0, 232.0].repeat(2);
        let feeders = vec![feeder("F1", &profile), feeder("F2", &profile)];
        let customer = CleanSeries::from_samples(&samples(&profile));
        let selection = select_feeder(&CustomerId::new("C1"), &customer, &feeders, &AnalysisConfig::default());
        assert_eq!(selection.into_best().unwrap().feeder_id.as_str(), "F1");
    }

    #[test]
    fn no_feeders_means_no_selection() {
        let customer = CleanSeries::from_samples(&samples(&[230.0; 12]));
        let selection = select_feeder(&CustomerId::new("C1"), &customer, &[], &AnalysisConfig::default());
        assert!(selection.best().is_none());
        assert!(selection.candidates.is_empty());
    }
}
