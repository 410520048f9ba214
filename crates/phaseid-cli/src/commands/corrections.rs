use std::path::Path;

use anyhow::Result;
use serde::Serialize;
use tracing::{info, warn};

use phaseid_cli::input::write_meters;
use phaseid_cli::session::AnalysisSession;
use phaseid_core::{CustomerId, FeederId};
use phaseid_match::{apply_phase_corrections, phase_corrections, PhaseCorrection};

use crate::commands::telemetry::RunTimer;
use crate::commands::util::{output_label, write_output};

#[derive(Serialize)]
struct CustomerCorrections {
    customer_id: CustomerId,
    feeder_id: FeederId,
    relabelled: bool,
    corrections: Vec<PhaseCorrection>,
}

pub fn handle(
    session_dir: &Path,
    customer: Option<&str>,
    write_series: Option<&Path>,
    out: Option<&Path>,
) -> Result<()> {
    let timer = RunTimer::start(session_dir, "corrections");
    let res = (|| -> Result<()> {
        let session = AnalysisSession::open(session_dir)?;
        let results = session.require_results()?;
        let selected: Vec<_> = results
            .assignments
            .iter()
            .filter(|a| customer.map_or(true, |id| a.customer_id.as_str() == id))
            .collect();

        let report: Vec<CustomerCorrections> = selected
            .iter()
            .map(|a| {
                let corrections = phase_corrections(a);
                CustomerCorrections {
                    customer_id: a.customer_id.clone(),
                    feeder_id: a.assigned_feeder_id.clone(),
                    relabelled: corrections.iter().any(PhaseCorrection::is_relabel),
                    corrections,
                }
            })
            .collect();
        info!(
            "{} of {} customers need phase relabelling",
            report.iter().filter(|r| r.relabelled).count(),
            report.len()
        );

        if let Some(path) = write_series {
            let mut corrected = Vec::new();
            for assignment in &selected {
                let Some(meter) = session.customer(assignment.customer_id.as_str()) else {
                    continue;
                };
                match apply_phase_corrections(meter, assignment) {
                    Ok(meter) => corrected.push(meter),
                    Err(err) => warn!(customer = %assignment.customer_id, "{err}"),
                }
            }
            write_meters(path, &corrected)?;
            println!(
                "Corrected series for {} customers written to {}",
                corrected.len(),
                path.display()
            );
        }
        write_output(&report, out, "corrections")
    })();
    let output = output_label(out);
    let series = write_series.map_or_else(|| "none".to_string(), |p| p.display().to_string());
    timer.finish(
        &output,
        &[
            ("customer", customer.unwrap_or("all")),
            ("write_series", series.as_str()),
        ],
        &res,
    );
    res
}
