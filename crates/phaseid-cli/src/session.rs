//! File-backed analysis session.
//!
//! A session directory holds one analysis context:
//!
//! ```text
//! <dir>/session.json   config + inputs (meters, loads, transformer telemetry)
//! <dir>/results.json   the current AnalysisResults, if any
//! <dir>/runs/          run-<uuid>.json manifests
//! ```
//!
//! There is a single writer per session. [`AnalysisSession::run`] replaces
//! the results wholesale; every file is written to a temp file in the same
//! directory and renamed over the previous one.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use phaseid_core::{
    AnalysisConfig, AnalysisResults, CustomerMeter, Diagnostics, FeederMeter, LoadTable,
    TransformerSample,
};
use phaseid_match::run_matching;

pub const SESSION_FILE: &str = "session.json";
pub const RESULTS_FILE: &str = "results.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInputs {
    pub customers: Vec<CustomerMeter>,
    pub feeders: Vec<FeederMeter>,
    #[serde(default)]
    pub loads: LoadTable,
    #[serde(default)]
    pub transformer: Vec<TransformerSample>,
    /// Problems found while reading the input files.
    #[serde(default)]
    pub diagnostics: Diagnostics,
}

#[derive(Serialize, Deserialize)]
struct SessionState {
    created_at: DateTime<Utc>,
    config: AnalysisConfig,
    inputs: SessionInputs,
}

#[derive(Debug)]
pub struct AnalysisSession {
    dir: PathBuf,
    created_at: DateTime<Utc>,
    config: AnalysisConfig,
    inputs: SessionInputs,
    results: Option<AnalysisResults>,
}

impl AnalysisSession {
    pub fn exists(dir: &Path) -> bool {
        dir.join(SESSION_FILE).is_file()
    }

    /// Start a session in `dir` (created if needed). Results left over from
    /// earlier inputs in the same directory are discarded.
    pub fn create(dir: &Path, config: AnalysisConfig, inputs: SessionInputs) -> Result<Self> {
        config.validate().context("invalid analysis configuration")?;
        fs::create_dir_all(dir)
            .with_context(|| format!("creating session directory {}", dir.display()))?;
        let stale = dir.join(RESULTS_FILE);
        if stale.exists() {
            fs::remove_file(&stale)
                .with_context(|| format!("removing stale results {}", stale.display()))?;
        }
        let session = Self {
            dir: dir.to_path_buf(),
            created_at: Utc::now(),
            config,
            inputs,
            results: None,
        };
        session.save()?;
        Ok(session)
    }

    pub fn open(dir: &Path) -> Result<Self> {
        if !Self::exists(dir) {
            return Err(anyhow!(
                "no session at {}; run `phaseid analyze` with --customers and --feeders first",
                dir.display()
            ));
        }
        let state: SessionState = read_json(&dir.join(SESSION_FILE))?;
        let results_path = dir.join(RESULTS_FILE);
        let results = if results_path.is_file() {
            Some(read_json(&results_path)?)
        } else {
            None
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            created_at: state.created_at,
            config: state.config,
            inputs: state.inputs,
            results,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn results_path(&self) -> PathBuf {
        self.dir.join(RESULTS_FILE)
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn inputs(&self) -> &SessionInputs {
        &self.inputs
    }

    pub fn results(&self) -> Option<&AnalysisResults> {
        self.results.as_ref()
    }

    pub fn require_results(&self) -> Result<&AnalysisResults> {
        self.results.as_ref().ok_or_else(|| {
            anyhow!(
                "session {} has no analysis results; run `phaseid analyze` first",
                self.dir.display()
            )
        })
    }

    pub fn customer(&self, id: &str) -> Option<&CustomerMeter> {
        self.inputs.customers.iter().find(|m| m.id.as_str() == id)
    }

    pub fn feeder(&self, id: &str) -> Option<&FeederMeter> {
        self.inputs.feeders.iter().find(|m| m.id.as_str() == id)
    }

    /// Transformer telemetry, `None` when the session has none.
    pub fn transformer(&self) -> Option<&[TransformerSample]> {
        Some(self.inputs.transformer.as_slice()).filter(|s| !s.is_empty())
    }

    pub fn set_config(&mut self, config: AnalysisConfig) -> Result<()> {
        config.validate().context("invalid analysis configuration")?;
        self.config = config;
        self.save()
    }

    pub fn set_loads(&mut self, loads: LoadTable) -> Result<()> {
        self.inputs.loads = loads;
        self.save()
    }

    pub fn set_transformer(&mut self, samples: Vec<TransformerSample>) -> Result<()> {
        self.inputs.transformer = samples;
        self.save()
    }

    /// Re-run matching from scratch and replace the session's results.
    pub fn run(&mut self) -> Result<&AnalysisResults> {
        let mut results = run_matching(&self.inputs.customers, &self.inputs.feeders, &self.config)
            .context("matching customers to feeders")?;
        let mut diagnostics = self.inputs.diagnostics.clone();
        diagnostics.merge(results.diagnostics);
        results.diagnostics = diagnostics;

        write_json_atomic(&self.results_path(), &results)?;
        info!(
            session = %self.dir.display(),
            matched = results.matched_count(),
            total = results.metadata.total_customers,
            "session results replaced"
        );
        Ok(self.results.insert(results))
    }

    fn save(&self) -> Result<()> {
        let state = SessionState {
            created_at: self.created_at,
            config: self.config.clone(),
            inputs: self.inputs.clone(),
        };
        write_json_atomic(&self.dir.join(SESSION_FILE), &state)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", path.display()))
}

/// Serialize to a temp file next to `path`, then rename it into place.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    serde_json::to_writer_pretty(&mut tmp, value)
        .with_context(|| format!("serializing {}", path.display()))?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
