//! # phaseid-core: shared data model for feeder and phase identification
//!
//! Holds the types every other `phaseid-*` crate speaks:
//!
//! - **Inputs**: [`Meter`]s with per-phase voltage [`PhaseSeries`], customer
//!   [`CustomerLoadProfile`]s and [`TransformerSample`] telemetry
//! - **Outputs**: [`CustomerAssignment`]s collected into [`AnalysisResults`]
//! - **Ambient**: [`PhaseIdError`], [`Diagnostics`], [`AnalysisConfig`] and
//!   unit newtypes
//!
//! The analysis crates are stateless; anything long-lived (a session, a
//! run manifest) belongs to the caller.
//!
//! ```rust
//! use phaseid_core::*;
//!
//! let customer: Meter<CustomerId> = Meter::new(CustomerId::new("CUST_1"));
//! assert!(customer.primary().is_none());
//!
//! let config = AnalysisConfig::default();
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod assignment;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod load;
pub mod series;
pub mod units;

pub use assignment::{
    AnalysisMetadata, AnalysisResults, CustomerAssignment, FeederMatch, MatchMetrics,
    PhaseAssignment, PhaseMatch, SummaryStats, UnmatchedCustomer, UnmatchedReason,
};
pub use config::{
    AnalysisConfig, BalancedFeederEstimate, BalancingConfig, DefaultLoad, MatchingConfig,
    MoveStrategyKind, ResolverKind, EXHAUSTIVE_CUSTOMER_LIMIT,
};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{PhaseIdError, PhaseIdResult};
pub use load::{CustomerLoadProfile, LoadSample, LoadTable, TransformerSample};
pub use series::{Meter, Phase, PhaseSeries, Sample};
pub use units::{Kilovars, Kilowatts, Volts};

// Newtype wrappers for IDs for type safety
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeederId(String);

macro_rules! impl_string_id {
    ($type:ident) => {
        impl $type {
            #[inline]
            pub fn new(value: impl Into<String>) -> Self {
                $type(value.into())
            }
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $type {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $type {
            fn from(value: &str) -> Self {
                $type::new(value)
            }
        }

        impl From<String> for $type {
            fn from(value: String) -> Self {
                $type(value)
            }
        }
    };
}

impl_string_id!(CustomerId);
impl_string_id!(FeederId);

/// A customer meter with its 1–3 phase series.
pub type CustomerMeter = Meter<CustomerId>;
/// A feeder-head meter with its 1–3 phase series.
pub type FeederMeter = Meter<FeederId>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = CustomerId::new("CUST_7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"CUST_7\"");
        let back: FeederId = serde_json::from_str("\"F2\"").unwrap();
        assert_eq!(back, FeederId::from("F2"));
        assert_eq!(back.to_string(), "F2");
    }

    #[test]
    fn ids_order_lexicographically() {
        let mut ids = vec![CustomerId::new("C2"), CustomerId::new("C10"), CustomerId::new("C1")];
        ids.sort();
        let names: Vec<_> = ids.iter().map(CustomerId::as_str).collect();
        assert_eq!(names, vec!["C1", "C10", "C2"]);
    }
}
