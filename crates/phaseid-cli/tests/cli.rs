use assert_cmd::Command;
use chrono::{TimeDelta, TimeZone, Utc};
use predicates::prelude::*;
use serde_json::Value;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn feeder_a(i: usize) -> f64 {
    230.0 + ((i * 3) % 7) as f64
}

fn feeder_b(i: usize) -> f64 {
    230.0 + ((i * 5) % 11) as f64 * 0.5
}

fn feeder_c(i: usize) -> f64 {
    230.0 + ((i * 2) % 5) as f64
}

fn feeder_two(i: usize) -> f64 {
    240.0 - ((i * 7) % 13) as f64
}

/// 24 readings at 15-minute ticks, shifted by `offset_minutes`.
fn rows(out: &mut String, meter: &str, phase: &str, offset_minutes: i64, value: fn(usize) -> f64, shift: f64) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for i in 0..24 {
        let ts = start + TimeDelta::minutes(15 * i as i64 + offset_minutes);
        writeln!(out, "{meter},{phase},{},{}", ts.to_rfc3339(), value(i) + shift).unwrap();
    }
}

struct Fixture {
    dir: TempDir,
    customers: PathBuf,
    feeders: PathBuf,
    loads: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempdir().unwrap();

        let mut feeders = String::from("meter_id,phase,timestamp,voltage\n");
        rows(&mut feeders, "F1", "A", 0, feeder_a, 0.0);
        rows(&mut feeders, "F1", "B", 0, feeder_b, 0.0);
        rows(&mut feeders, "F1", "C", 0, feeder_c, 0.0);
        rows(&mut feeders, "F2", "A", 0, feeder_two, 0.0);

        let mut customers = String::from("meter_id,phase,timestamp,voltage\n");
        rows(&mut customers, "C1", "A", 1, feeder_a, 0.0);
        rows(&mut customers, "C2", "A", -2, feeder_a, 0.5);
        rows(&mut customers, "C3", "Phase A", 2, feeder_two, -1.0);
        customers.push_str("C3,A,2024-01-02T00:00:00Z,n/a\n");
        customers.push_str("C3,A,not-a-time,231.0\n");

        let loads = "customer_id,real_kw,reactive_kvar,voltage\n\
                     C1,10.0,1.0,231.0\n\
                     C2,30.0,2.0,229.0\n\
                     C3,5.0,,\n";

        let fixture = Self {
            customers: dir.path().join("customers.csv"),
            feeders: dir.path().join("feeders.csv"),
            loads: dir.path().join("loads.csv"),
            dir,
        };
        fs::write(&fixture.customers, customers).unwrap();
        fs::write(&fixture.feeders, feeders).unwrap();
        fs::write(&fixture.loads, loads).unwrap();
        fixture
    }

    fn session(&self) -> PathBuf {
        self.dir.path().join("session")
    }

    fn analyze(&self) {
        phaseid()
            .args([
                "analyze",
                "--session",
                path_str(&self.session()),
                "--customers",
                path_str(&self.customers),
                "--feeders",
                path_str(&self.feeders),
                "--loads",
                path_str(&self.loads),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("All 3 customers assigned to feeders"));
    }

    fn json(&self, args: &[&str]) -> Value {
        let mut full: Vec<&str> = args.to_vec();
        let session = self.session();
        full.extend(["--session", path_str(&session)]);
        let output = phaseid().args(&full).output().unwrap();
        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

fn phaseid() -> Command {
    Command::cargo_bin("phaseid").unwrap()
}

fn path_str(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[test]
fn analyze_then_topology_then_balance() {
    let fx = Fixture::new();
    fx.analyze();

    let results: Value =
        serde_json::from_str(&fs::read_to_string(fx.session().join("results.json")).unwrap())
            .unwrap();
    let assignments = results["assignments"].as_array().unwrap();
    assert_eq!(assignments.len(), 3);
    let feeder_of = |id: &str| {
        assignments
            .iter()
            .find(|a| a["customer_id"] == id)
            .map(|a| a["assigned_feeder_id"].as_str().unwrap().to_string())
            .unwrap()
    };
    assert_eq!(feeder_of("C1"), "F1");
    assert_eq!(feeder_of("C2"), "F1");
    assert_eq!(feeder_of("C3"), "F2");
    let issues = results["diagnostics"]["issues"].as_array().unwrap();
    assert!(issues.iter().any(|i| i["category"] == "timestamp"));
    assert!(issues.iter().any(|i| i["category"] == "malformed"));

    let topo_path = fx.dir.path().join("topology.json");
    phaseid()
        .args([
            "topology",
            "--session",
            path_str(&fx.session()),
            "--out",
            path_str(&topo_path),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Topology written to"));
    let topology: Value = serde_json::from_str(&fs::read_to_string(&topo_path).unwrap()).unwrap();
    assert_eq!(topology["total_feeders"], 2);
    assert_eq!(topology["total_customers"], 3);
    assert!(topology["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .any(|n| n["id"] == "transformer"));

    let analysis = fx.json(&["balance", "analyze"]);
    assert_eq!(analysis["total_feeders"], 2);
    assert!(analysis["imbalanced_feeders"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "F1"));

    let suggestions = fx.json(&["balance", "suggest"]);
    let moves = suggestions["suggestions"].as_array().unwrap();
    assert!(!moves.is_empty());
    for mv in moves {
        assert_eq!(mv["from_phase"], "Phase A");
        assert_ne!(mv["to_phase"], "Phase A");
    }

    let simulation = fx.json(&["balance", "simulate", "--top", "1"]);
    assert_eq!(simulation["moves_applied"], 1);
    assert!(
        simulation["after"]["avg_imbalance"].as_f64().unwrap()
            < simulation["before"]["avg_imbalance"].as_f64().unwrap()
    );

    let losses = fx.json(&["balance", "losses"]);
    assert_eq!(losses.as_array().unwrap().len(), 2);

    let runs = phaseid()
        .args([
            "runs",
            "list",
            "--root",
            path_str(&fx.session()),
            "--format",
            "json",
        ])
        .output()
        .unwrap();
    assert!(runs.status.success());
    let runs: Value = serde_json::from_slice(&runs.stdout).unwrap();
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 6);
    assert!(runs.iter().all(|r| r["status"] == "success"));
}

#[test]
fn rerun_uses_stored_inputs_and_new_flags() {
    let fx = Fixture::new();
    fx.analyze();
    phaseid()
        .args([
            "analyze",
            "--session",
            path_str(&fx.session()),
            "--resolver",
            "optimal",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("resolver: optimal"));

    let describe = phaseid()
        .args(["runs", "list", "--root", path_str(&fx.session())])
        .assert()
        .success();
    let listing = String::from_utf8_lossy(&describe.get_output().stdout).to_string();
    assert_eq!(listing.matches("analyze").count(), 2);
}

#[test]
fn trace_and_corrections_use_assignments() {
    let fx = Fixture::new();
    fx.analyze();

    let trace = fx.json(&["trace", "--customer", "C1"]);
    assert_eq!(trace["feeder_id"], "F1");
    assert!(trace["correlation"].as_f64().unwrap() > 0.999);
    assert_eq!(trace["points"].as_array().unwrap().len(), 24);

    let series_out = fx.dir.path().join("corrected.csv");
    let report_out = fx.dir.path().join("corrections.json");
    phaseid()
        .args([
            "corrections",
            "--session",
            path_str(&fx.session()),
            "--customer",
            "C3",
            "--write-series",
            path_str(&series_out),
            "--out",
            path_str(&report_out),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Corrected series for 1 customers"));
    let report: Value = serde_json::from_str(&fs::read_to_string(&report_out).unwrap()).unwrap();
    let report = report.as_array().unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0]["feeder_id"], "F2");
    assert_eq!(report[0]["relabelled"], false);

    let csv = fs::read_to_string(&series_out).unwrap();
    assert!(csv.starts_with("meter_id,phase,timestamp,voltage"));
    assert!(csv.lines().skip(1).all(|l| l.starts_with("C3,A,")));
}

#[test]
fn invalid_tolerance_is_rejected() {
    let fx = Fixture::new();
    phaseid()
        .args([
            "analyze",
            "--session",
            path_str(&fx.session()),
            "--customers",
            path_str(&fx.customers),
            "--feeders",
            path_str(&fx.feeders),
            "--tolerance-minutes=-5",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("tolerance_minutes"));
    assert!(!fx.session().exists());
}

#[test]
fn commands_without_session_fail() {
    let dir = tempdir().unwrap();
    phaseid()
        .args([
            "topology",
            "--session",
            path_str(&dir.path().join("missing")),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no session"));
}

#[test]
fn config_show_prints_defaults() {
    phaseid()
        .args(["config", "show", "--max-moves", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("imbalance_threshold = 0.15"))
        .stdout(predicate::str::contains("max_moves_per_feeder = 3"));
}
