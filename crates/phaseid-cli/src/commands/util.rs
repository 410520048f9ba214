use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;

/// Pretty JSON to `out`, or to stdout when no path is given.
pub fn write_output<T: Serialize>(value: &T, out: Option<&Path>, what: &str) -> Result<()> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(value)
                .with_context(|| format!("serializing {what} to JSON"))?;
            fs::write(path, json).with_context(|| format!("writing {what} to {}", path.display()))?;
            println!("{} written to {}", capitalize(what), path.display());
        }
        None => {
            serde_json::to_writer_pretty(io::stdout(), value)
                .with_context(|| format!("serializing {what} to JSON"))?;
            println!();
        }
    }
    Ok(())
}

/// Label for the manifest's `outputs` entry.
pub fn output_label(out: Option<&Path>) -> String {
    out.map_or_else(|| "stdout".to_string(), |p| p.display().to_string())
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_json_file_and_creates_parents() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("nested").join("out.json");
        write_output(&vec![1, 2, 3], Some(&out), "numbers").unwrap();
        let back: Vec<i32> = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(back, vec![1, 2, 3]);
        assert_eq!(output_label(Some(&out)), out.display().to_string());
        assert_eq!(output_label(None), "stdout");
    }

    #[test]
    fn capitalizes_labels() {
        assert_eq!(capitalize("topology"), "Topology");
        assert_eq!(capitalize(""), "");
    }
}
