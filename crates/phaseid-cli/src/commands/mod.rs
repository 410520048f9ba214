pub mod analyze;
pub mod balance;
pub mod config;
pub mod corrections;
pub mod runs;
pub mod telemetry;
pub mod topology;
pub mod trace;
pub mod util;
