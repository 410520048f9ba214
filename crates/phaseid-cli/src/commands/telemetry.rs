//! Run manifests for commands that work inside a session.

use std::{env, path::Path, time::Instant};

use anyhow::Result;
use tracing::{debug, warn};

use phaseid_cli::manifest::{record_manifest, ManifestTelemetry, Param};
use phaseid_cli::session::AnalysisSession;

const ENV_PREFIX: &str = "PHASEID_";
const CORRELATION_ENV: &str = "PHASEID_CORRELATION_ID";

/// Times one session-bound command; [`RunTimer::finish`] appends its
/// manifest to the session's run history.
pub struct RunTimer<'a> {
    session: &'a Path,
    command: &'a str,
    start: Instant,
}

impl<'a> RunTimer<'a> {
    pub fn start(session: &'a Path, command: &'a str) -> Self {
        Self {
            session,
            command,
            start: Instant::now(),
        }
    }

    /// Commands that failed before the session existed leave no record.
    pub fn finish(self, output: &str, params: &[(&str, &str)], result: &Result<()>) {
        if !AnalysisSession::exists(self.session) {
            debug!(session = %self.session.display(), command = self.command, "no session, run not recorded");
            return;
        }
        let telemetry = ManifestTelemetry {
            status: if result.is_ok() { "success" } else { "failure" }.to_string(),
            duration_ms: Some(self.start.elapsed().as_millis()),
            env: site_env(),
            correlation_id: correlation_id(),
            error: result.as_ref().err().map(|err| format!("{err:#}")),
        };
        if let Err(err) = record_manifest(self.session, output, self.command, params, telemetry) {
            warn!("failed to record run manifest: {err:#}");
        }
    }
}

/// `PHASEID_*` variables except the correlation id, sorted by name.
fn site_env() -> Vec<Param> {
    let mut vars: Vec<Param> = env::vars()
        .filter(|(name, _)| name.starts_with(ENV_PREFIX) && name != CORRELATION_ENV)
        .map(|(name, value)| Param { name, value })
        .collect();
    vars.sort_by(|a, b| a.name.cmp(&b.name));
    vars
}

fn correlation_id() -> Option<String> {
    env::var(CORRELATION_ENV)
        .or_else(|_| env::var("GITHUB_RUN_ID"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseid_cli::runs::discover_runs;
    use phaseid_cli::session::SESSION_FILE;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn failed_runs_record_the_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SESSION_FILE), "{}").unwrap();

        let res: Result<()> = Err(anyhow::anyhow!("has no analysis results"));
        RunTimer::start(dir.path(), "topology").finish("stdout", &[("transformer", "T1")], &res);

        let runs = discover_runs(dir.path()).unwrap();
        assert_eq!(runs.len(), 1);
        let telemetry = runs[0].manifest.telemetry.clone().unwrap();
        assert_eq!(telemetry.status, "failure");
        assert_eq!(telemetry.error.as_deref(), Some("has no analysis results"));
        assert_eq!(runs[0].manifest.params[0].value, "T1");
    }

    #[test]
    fn directories_without_a_session_are_left_alone() {
        let dir = tempdir().unwrap();
        RunTimer::start(dir.path(), "trace").finish("stdout", &[], &Ok(()));
        assert!(!dir.path().join("runs").exists());
    }
}
