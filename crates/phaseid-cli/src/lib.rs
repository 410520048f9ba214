//! Command-line front end for the phaseid workspace.
//!
//! The binary lives in `main.rs`; this library holds the pieces the
//! commands share and the tests drive directly: argument definitions,
//! config resolution, CSV readers, the session directory and run manifests.

pub mod cli;
pub mod config;
pub mod input;
pub mod manifest;
pub mod runs;
pub mod session;

pub use cli::{build_cli_command, Cli, Commands};
pub use session::{AnalysisSession, SessionInputs};
