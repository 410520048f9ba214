//! Customer → feeder → phase identification.
//!
//! [`run_matching`] drives the whole batch: each customer's primary series
//! selects a feeder ([`select_feeder`]), the customer's phases are scored
//! against that feeder's phases ([`correlate_phases`]) and a
//! [`PhaseResolver`] turns the score matrix into phase assignments.

pub mod corrections;
pub mod correlator;
pub mod prepared;
pub mod resolver;
pub mod runner;
pub mod selector;
pub mod trace;

pub use corrections::{apply_phase_corrections, phase_corrections, PhaseCorrection};
pub use correlator::correlate_phases;
pub use prepared::PreparedMeter;
pub use resolver::{build_resolver, GreedyResolver, OptimalResolver, PhaseResolver};
pub use runner::{match_customer, run_matching, CustomerOutcome};
pub use selector::{select_feeder, FeederSelection};
pub use trace::{aligned_trace, AlignedTrace, TracePoint};
