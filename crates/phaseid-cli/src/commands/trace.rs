use std::path::Path;

use anyhow::{anyhow, Result};

use phaseid_cli::session::AnalysisSession;
use phaseid_match::aligned_trace;

use crate::commands::telemetry::RunTimer;
use crate::commands::util::{output_label, write_output};

pub fn handle(
    session_dir: &Path,
    customer: &str,
    feeder: Option<&str>,
    out: Option<&Path>,
) -> Result<()> {
    let timer = RunTimer::start(session_dir, "trace");
    let res = (|| -> Result<()> {
        let session = AnalysisSession::open(session_dir)?;
        let meter = session
            .customer(customer)
            .ok_or_else(|| anyhow!("customer '{customer}' is not in the session inputs"))?;
        let feeder_id = match feeder {
            Some(id) => id.to_string(),
            None => session
                .require_results()?
                .assignments
                .iter()
                .find(|a| a.customer_id.as_str() == customer)
                .map(|a| a.assigned_feeder_id.as_str().to_string())
                .ok_or_else(|| {
                    anyhow!("customer '{customer}' has no assigned feeder; pass --feeder")
                })?,
        };
        let feeder_meter = session
            .feeder(&feeder_id)
            .ok_or_else(|| anyhow!("feeder '{feeder_id}' is not in the session inputs"))?;
        let trace = aligned_trace(meter, feeder_meter, session.config()).ok_or_else(|| {
            anyhow!(
                "customer '{customer}' and feeder '{feeder_id}' share fewer than {} aligned samples",
                session.config().matching.min_aligned_points
            )
        })?;
        write_output(&trace, out, "trace")
    })();
    let output = output_label(out);
    timer.finish(
        &output,
        &[("customer", customer), ("feeder", feeder.unwrap_or("assigned"))],
        &res,
    );
    res
}
