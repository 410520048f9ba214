//! Unified error type for the phaseid workspace
//!
//! The analysis core degrades by omission instead of failing, so the only
//! errors that surface here come from the boundaries: reading inputs,
//! parsing them, and validating configuration before any analysis starts.
//!
//! # Example
//!
//! ```ignore
//! use phaseid_core::{AnalysisConfig, PhaseIdResult};
//!
//! fn prepare(config: &AnalysisConfig) -> PhaseIdResult<()> {
//!     config.validate()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all phaseid operations.
#[derive(Error, Debug)]
pub enum PhaseIdError {
    /// I/O errors (file access, session directory, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Input data validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors (rejected before the core runs)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using PhaseIdError.
pub type PhaseIdResult<T> = Result<T, PhaseIdError>;

impl From<anyhow::Error> for PhaseIdError {
    fn from(err: anyhow::Error) -> Self {
        PhaseIdError::Other(err.to_string())
    }
}

impl From<String> for PhaseIdError {
    fn from(s: String) -> Self {
        PhaseIdError::Other(s)
    }
}

impl From<&str> for PhaseIdError {
    fn from(s: &str) -> Self {
        PhaseIdError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for PhaseIdError {
    fn from(err: serde_json::Error) -> Self {
        PhaseIdError::Parse(err.to_string())
    }
}
