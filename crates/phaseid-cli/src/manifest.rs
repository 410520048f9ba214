use std::{fs, path::Path};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Manifests live next to the artifact they describe, under this directory.
pub const RUNS_DIR: &str = "runs";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub run_id: String,
    pub command: String,
    pub version: String,
    pub timestamp: String,
    pub outputs: Vec<String>,
    pub params: Vec<Param>,
    #[serde(default)]
    pub telemetry: Option<ManifestTelemetry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestTelemetry {
    pub status: String,
    #[serde(default)]
    pub duration_ms: Option<u128>,
    #[serde(default)]
    pub env: Vec<Param>,
    #[serde(default)]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn is_manifest_name(name: &str) -> bool {
    name.starts_with("run-") && name.ends_with(".json")
}

/// Write `run-<uuid>.json` into `<session>/runs/` and return its path.
pub fn record_manifest(
    session: &Path,
    output: &str,
    command: &str,
    params: &[(&str, &str)],
    telemetry: ManifestTelemetry,
) -> Result<std::path::PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    let dir = session.join(RUNS_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    let manifest = ManifestEntry {
        run_id: run_id.clone(),
        command: command.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        outputs: vec![output.to_string()],
        params: params
            .iter()
            .map(|(k, v)| Param {
                name: k.to_string(),
                value: v.to_string(),
            })
            .collect(),
        telemetry: Some(telemetry),
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let path = dir.join(format!("run-{}.json", run_id));
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    tracing::debug!(path = %path.display(), "recorded run manifest");
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<ManifestEntry> {
    let json = fs::read_to_string(path)?;
    let manifest = serde_json::from_str(&json)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn manifest_round_trips() {
        let dir = tempdir().unwrap();
        let path = record_manifest(
            dir.path(),
            "results.json",
            "analyze",
            &[("tolerance_minutes", "15")],
            ManifestTelemetry {
                status: "success".into(),
                duration_ms: Some(12),
                env: Vec::new(),
                correlation_id: None,
                error: None,
            },
        )
        .unwrap();
        assert!(path.starts_with(dir.path().join(RUNS_DIR)));
        let entry = read_manifest(&path).unwrap();
        assert_eq!(entry.command, "analyze");
        assert_eq!(entry.params[0].value, "15");
        assert_eq!(entry.telemetry.unwrap().duration_ms, Some(12));
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains(&entry.run_id));
    }

    #[test]
    fn manifests_without_telemetry_still_parse() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run-old.json");
        fs::write(
            &path,
            r#"{"run_id":"x","command":"analyze","version":"0.1.0","timestamp":"t","outputs":[],"params":[]}"#,
        )
        .unwrap();
        assert!(read_manifest(&path).unwrap().telemetry.is_none());
        assert!(is_manifest_name("run-old.json"));
        assert!(!is_manifest_name("results.json"));
    }
}
