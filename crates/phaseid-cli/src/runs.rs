//! Run history across analysis sessions.
//!
//! A root is either one session directory or a tree holding several. Each
//! directory with a `session.json` contributes the manifests in its `runs/`;
//! the walk does not descend into sessions.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use walkdir::{DirEntry, WalkDir};

use crate::manifest::{self, ManifestEntry, RUNS_DIR};
use crate::session::AnalysisSession;

/// How far below the root session directories are looked for.
const SESSION_SEARCH_DEPTH: usize = 4;

#[derive(Clone, Debug)]
pub struct RunRecord {
    pub session: PathBuf,
    pub manifest: ManifestEntry,
    pub path: PathBuf,
}

#[derive(Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub session: String,
    pub command: String,
    pub timestamp: String,
    pub status: String,
    pub duration_ms: Option<u128>,
    pub outputs: Vec<String>,
}

impl RunSummary {
    pub fn from_record(record: &RunRecord) -> Self {
        let telemetry = record.manifest.telemetry.as_ref();
        Self {
            run_id: record.manifest.run_id.clone(),
            session: record.session.display().to_string(),
            command: record.manifest.command.clone(),
            timestamp: record.manifest.timestamp.clone(),
            status: telemetry.map_or_else(|| "unknown".to_string(), |t| t.status.clone()),
            duration_ms: telemetry.and_then(|t| t.duration_ms),
            outputs: record.manifest.outputs.clone(),
        }
    }
}

/// Session directories at or below `root`, in path order.
pub fn discover_sessions(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Ok(vec![]);
    }
    let mut sessions = Vec::new();
    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .max_depth(SESSION_SEARCH_DEPTH)
        .sort_by_file_name()
        .into_iter();
    while let Some(entry) = walker.next() {
        let entry = entry.with_context(|| format!("scanning {}", root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        if is_hidden(&entry) {
            walker.skip_current_dir();
            continue;
        }
        if AnalysisSession::exists(entry.path()) {
            sessions.push(entry.into_path());
            walker.skip_current_dir();
        }
    }
    Ok(sessions)
}

/// Manifests recorded in one session, oldest first.
pub fn session_runs(session: &Path) -> Result<Vec<RunRecord>> {
    let dir = session.join(RUNS_DIR);
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut runs = Vec::new();
    for entry in fs::read_dir(&dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(manifest::is_manifest_name);
        if is_manifest && path.is_file() {
            runs.push(load_manifest(session, &path)?);
        }
    }
    sort_runs(&mut runs);
    Ok(runs)
}

/// Every run of every session below `root`, oldest first.
pub fn discover_runs(root: &Path) -> Result<Vec<RunRecord>> {
    let mut runs = Vec::new();
    for session in discover_sessions(root)? {
        runs.extend(session_runs(&session)?);
    }
    sort_runs(&mut runs);
    Ok(runs)
}

/// Find a run by manifest path, run id, or `run-<id>` file name.
pub fn resolve_manifest(root: &Path, target: &str) -> Result<RunRecord> {
    if target.is_empty() {
        return Err(anyhow!("run target cannot be empty"));
    }

    let candidate = PathBuf::from(target);
    if candidate.is_file() {
        let session = candidate
            .parent()
            .and_then(Path::parent)
            .map_or_else(PathBuf::new, Path::to_path_buf);
        return load_manifest(&session, &candidate);
    }

    let run_id = target
        .strip_prefix("run-")
        .unwrap_or(target)
        .trim_end_matches(".json");
    discover_runs(root)?
        .into_iter()
        .find(|record| record.manifest.run_id == run_id)
        .ok_or_else(|| anyhow!("no run '{}' under {}", target, root.display()))
}

pub fn summaries(records: &[RunRecord]) -> Vec<RunSummary> {
    records.iter().map(RunSummary::from_record).collect()
}

fn sort_runs(runs: &mut [RunRecord]) {
    runs.sort_by(|a, b| {
        a.manifest
            .timestamp
            .cmp(&b.manifest.timestamp)
            .then_with(|| a.path.cmp(&b.path))
    });
}

fn load_manifest(session: &Path, path: &Path) -> Result<RunRecord> {
    let manifest = manifest::read_manifest(path)
        .with_context(|| format!("reading manifest {}", path.display()))?;
    Ok(RunRecord {
        session: session.to_path_buf(),
        manifest,
        path: path.to_path_buf(),
    })
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}
