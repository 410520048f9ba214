use std::path::Path;

use anyhow::Result;
use tracing::info;

use phaseid_cli::session::AnalysisSession;
use phaseid_topo::build_topology;

use crate::commands::telemetry::RunTimer;
use crate::commands::util::{output_label, write_output};

pub fn handle(session_dir: &Path, transformer: &str, out: Option<&Path>) -> Result<()> {
    let timer = RunTimer::start(session_dir, "topology");
    let res = (|| -> Result<()> {
        let session = AnalysisSession::open(session_dir)?;
        let results = session.require_results()?;
        let topology = build_topology(&results.assignments, transformer);
        info!(
            "Topology: {} feeders, {} customers, {} nodes",
            topology.total_feeders,
            topology.total_customers,
            topology.nodes.len()
        );
        write_output(&topology, out, "topology")
    })();
    let output = output_label(out);
    timer.finish(&output, &[("transformer", transformer)], &res);
    res
}
