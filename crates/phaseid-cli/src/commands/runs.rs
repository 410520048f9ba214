use std::io::{self, Write};

use anyhow::Result;
use tabwriter::TabWriter;

use phaseid_cli::cli::{RunFormat, RunsCommands};
use phaseid_cli::runs::{discover_runs, resolve_manifest, summaries, RunRecord};

pub fn handle(command: &RunsCommands) -> Result<()> {
    match command {
        RunsCommands::List { root, format } => {
            let records = discover_runs(root)?;
            match format {
                RunFormat::Plain => print_run_table(&records),
                RunFormat::Json => print_run_json(&records),
            }
        }
        RunsCommands::Describe {
            target,
            root,
            format,
        } => {
            let record = resolve_manifest(root, target)?;
            match format {
                RunFormat::Plain => describe_manifest(&record),
                RunFormat::Json => {
                    serde_json::to_writer_pretty(io::stdout(), &record.manifest)
                        .map_err(|err| anyhow::anyhow!("serializing manifest: {err}"))?;
                    println!();
                }
            }
            Ok(())
        }
    }
}

fn print_run_table(records: &[RunRecord]) -> Result<()> {
    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "SESSION\tCOMMAND\tSTATUS\tDURATION\tTIMESTAMP\tRUN ID")?;
    for summary in summaries(records) {
        let duration = summary
            .duration_ms
            .map_or_else(|| "-".to_string(), |ms| format!("{ms} ms"));
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            summary.session, summary.command, summary.status, duration, summary.timestamp, summary.run_id
        )?;
    }
    writer.flush()?;
    Ok(())
}

fn print_run_json(records: &[RunRecord]) -> Result<()> {
    let runs = summaries(records);
    serde_json::to_writer_pretty(io::stdout(), &runs)
        .map_err(|err| anyhow::anyhow!("serializing run list to JSON: {err}"))?;
    println!();
    Ok(())
}

fn describe_manifest(record: &RunRecord) {
    let manifest = &record.manifest;
    println!(
        "Run {} (`phaseid {}` v{} at {})",
        manifest.run_id, manifest.command, manifest.version, manifest.timestamp
    );
    println!("Session: {}", record.session.display());
    println!("Manifest: {}", record.path.display());
    if let Some(telemetry) = &manifest.telemetry {
        match telemetry.duration_ms {
            Some(ms) => println!("Status: {} ({ms} ms)", telemetry.status),
            None => println!("Status: {}", telemetry.status),
        }
        if let Some(error) = &telemetry.error {
            println!("Error: {error}");
        }
    }
    if !manifest.params.is_empty() {
        println!("Parameters:");
        for param in &manifest.params {
            println!("  {} = {}", param.name, param.value);
        }
    }
    if !manifest.outputs.is_empty() {
        println!("Outputs:");
        for output in &manifest.outputs {
            println!("  {output}");
        }
    }
}
