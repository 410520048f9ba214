use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info, warn};

use phaseid_core::{
    AnalysisConfig, AnalysisMetadata, AnalysisResults, CustomerAssignment, CustomerId,
    CustomerMeter, Diagnostics, FeederId, FeederMatch, FeederMeter, PhaseIdError, PhaseIdResult,
    UnmatchedCustomer, UnmatchedReason,
};

use crate::correlator::correlate_phases;
use crate::prepared::PreparedMeter;
use crate::resolver::{build_resolver, PhaseResolver};
use crate::selector::select_feeder;

/// What happened to one customer during a batch run.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerOutcome {
    Matched {
        assignment: CustomerAssignment,
        /// Every feeder that reached the minimum aligned points.
        candidates: Vec<FeederMatch>,
    },
    Unmatched(UnmatchedCustomer),
}

/// Select a feeder for one customer, build its phase matrix against that
/// feeder and resolve it.
pub fn match_customer(
    customer: &PreparedMeter<CustomerId>,
    feeders: &[PreparedMeter<FeederId>],
    resolver: &dyn PhaseResolver,
    config: &AnalysisConfig,
) -> CustomerOutcome {
    let unmatched = |reason| {
        CustomerOutcome::Unmatched(UnmatchedCustomer {
            customer_id: customer.id.clone(),
            reason,
        })
    };

    let Some((_, primary)) = customer.primary() else {
        return unmatched(UnmatchedReason::NoPrimarySeries);
    };
    let selection = select_feeder(&customer.id, primary, feeders, config);
    let Some(best) = selection.best().cloned() else {
        return unmatched(UnmatchedReason::NoCandidateFeeder);
    };
    let Some(feeder) = feeders.iter().find(|f| f.id == best.feeder_id) else {
        return unmatched(UnmatchedReason::NoCandidateFeeder);
    };

    let matrix = correlate_phases(customer, feeder, config);
    let customer_phases = customer.phases();
    let Some(phase_assignments) = resolver.resolve(&customer_phases, &feeder.phases(), &matrix)
    else {
        return unmatched(UnmatchedReason::IncompletePhaseMatrix);
    };

    debug!(
        customer = %customer.id,
        feeder = %best.feeder_id,
        phases = phase_assignments.len(),
        "customer matched"
    );
    CustomerOutcome::Matched {
        assignment: CustomerAssignment {
            customer_id: customer.id.clone(),
            assigned_feeder_id: best.feeder_id.clone(),
            metrics: best.metrics,
            phase_assignments,
            phase_matches: matrix,
        },
        candidates: selection.candidates,
    }
}

/// Match every customer against every feeder and assemble the run's results.
///
/// Customers are processed on a rayon pool (`config.threads`, 0 = one per
/// CPU). Results are merged in customer input order and then sorted, so the
/// output does not depend on the thread count.
pub fn run_matching(
    customers: &[CustomerMeter],
    feeders: &[FeederMeter],
    config: &AnalysisConfig,
) -> PhaseIdResult<AnalysisResults> {
    config.validate()?;

    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|e| PhaseIdError::Other(format!("building Rayon thread pool for matching: {e}")))?;

    let mut diagnostics = Diagnostics::new();
    let feeders: Vec<PreparedMeter<FeederId>> = feeders.iter().map(PreparedMeter::from_meter).collect();
    for feeder in &feeders {
        if feeder.primary().is_none() {
            diagnostics.add_warning_with_entity(
                "feeder",
                "feeder has no voltage series and cannot be a candidate",
                feeder.id.as_str(),
            );
        }
        record_dropped(&mut diagnostics, feeder.id.as_str(), feeder.dropped());
    }

    let resolver = build_resolver(config.matching.resolver);
    let outcomes: Vec<(usize, CustomerOutcome)> = pool.install(|| {
        customers
            .par_iter()
            .map(|meter| {
                let prepared = PreparedMeter::from_meter(meter);
                let outcome = match_customer(&prepared, &feeders, resolver.as_ref(), config);
                (prepared.dropped(), outcome)
            })
            .collect()
    });

    let mut assignments = Vec::new();
    let mut unmatched = Vec::new();
    for (meter, (dropped, outcome)) in customers.iter().zip(outcomes) {
        record_dropped(&mut diagnostics, meter.id.as_str(), dropped);
        match outcome {
            CustomerOutcome::Matched { assignment, .. } => assignments.push(assignment),
            CustomerOutcome::Unmatched(customer) => {
                warn!(customer = %customer.customer_id, reason = customer.reason.as_str(), "customer not matched");
                diagnostics.add_warning_with_entity(
                    "unmatched",
                    customer.reason.as_str(),
                    customer.customer_id.as_str(),
                );
                unmatched.push(customer);
            }
        }
    }

    let metadata = AnalysisMetadata {
        total_customers: customers.len(),
        total_feeders: feeders.len(),
        available_feeders: feeders.iter().map(|f| f.id.clone()).collect(),
        tolerance_minutes: config.matching.tolerance_minutes,
        min_aligned_points: config.matching.min_aligned_points,
        resolver: resolver.name().to_string(),
        analyzed_at: Utc::now(),
    };
    let results = AnalysisResults::new(assignments, unmatched, metadata, diagnostics);
    info!(
        customers = customers.len(),
        feeders = feeders.len(),
        matched = results.matched_count(),
        threads = thread_count,
        "{}",
        results.status_message()
    );
    Ok(results)
}

fn record_dropped(diagnostics: &mut Diagnostics, entity: &str, dropped: usize) {
    if dropped > 0 {
        diagnostics.add_warning_with_entity(
            "malformed",
            &format!("{dropped} samples with missing or non-numeric voltage dropped"),
            entity,
        );
    }
}
