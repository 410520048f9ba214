//! CSV readers for normalized long-format inputs.
//!
//! Column-format detection happens upstream; these readers expect fixed
//! headers. Row-level problems never abort a read: rows that cannot be
//! used are dropped and recorded in the returned [`Diagnostics`]. Only a
//! missing or unreadable file is an error.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use phaseid_core::{
    CustomerId, CustomerLoadProfile, CustomerMeter, Diagnostics, LoadSample, LoadTable, Meter,
    Phase, PhaseSeries, Sample, TransformerSample,
};

/// Naive formats tried after RFC 3339, in order. Naive times are taken as UTC.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
];

pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Finite number or nothing. Blank and non-numeric cells are missing.
fn parse_number(raw: Option<&str>) -> Option<f64> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

#[derive(Debug, Deserialize)]
struct SeriesRow {
    meter_id: String,
    phase: String,
    timestamp: String,
    #[serde(default)]
    voltage: Option<String>,
}

/// Read `meter_id,phase,timestamp,voltage` rows into meters, in order of
/// first appearance. Unparseable voltages become missing samples (the core
/// drops them before alignment); rows with an unknown phase or timestamp
/// are dropped here.
pub fn read_meters<I: From<String>>(path: &Path, diag: &mut Diagnostics) -> Result<Vec<Meter<I>>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening series CSV {}", path.display()))?;

    let mut order: Vec<String> = Vec::new();
    let mut series: HashMap<String, BTreeMap<Phase, Vec<Sample>>> = HashMap::new();
    let mut bad_timestamps = 0usize;
    for (idx, result) in reader.deserialize::<SeriesRow>().enumerate() {
        let line = idx + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                diag.add_error_at_line("input", &format!("unreadable series row: {err}"), line);
                continue;
            }
        };
        let phase = match row.phase.parse::<Phase>() {
            Ok(phase) => phase,
            Err(err) => {
                diag.add_warning_at_line("input", &err.to_string(), line);
                continue;
            }
        };
        let Some(timestamp) = parse_timestamp(&row.timestamp) else {
            bad_timestamps += 1;
            diag.add_warning_at_line(
                "timestamp",
                &format!("unparseable timestamp '{}'", row.timestamp),
                line,
            );
            continue;
        };
        let sample = match parse_number(row.voltage.as_deref()) {
            Some(voltage) => Sample::new(timestamp, voltage),
            None => Sample::missing(timestamp),
        };
        if !series.contains_key(&row.meter_id) {
            order.push(row.meter_id.clone());
        }
        series
            .entry(row.meter_id)
            .or_default()
            .entry(phase)
            .or_default()
            .push(sample);
    }
    if bad_timestamps > 0 {
        tracing::warn!(
            path = %path.display(),
            dropped = bad_timestamps,
            "rows with unparseable timestamps dropped"
        );
    }

    let meters = order
        .into_iter()
        .map(|id| {
            let phases = series.remove(&id).unwrap_or_default();
            let mut meter = Meter::new(I::from(id));
            for (phase, samples) in phases {
                meter.insert_phase(PhaseSeries::new(phase, samples));
            }
            meter
        })
        .collect();
    Ok(meters)
}

#[derive(Debug, Deserialize)]
struct LoadRow {
    customer_id: String,
    #[serde(default)]
    real_kw: Option<String>,
    #[serde(default)]
    reactive_kvar: Option<String>,
    #[serde(default)]
    voltage: Option<String>,
}

/// Read `customer_id,real_kw,reactive_kvar,voltage` rows; several rows per
/// customer are averaged later by the load aggregator.
pub fn read_loads(path: &Path, diag: &mut Diagnostics) -> Result<LoadTable> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening loads CSV {}", path.display()))?;
    let mut table = LoadTable::new();
    for (idx, result) in reader.deserialize::<LoadRow>().enumerate() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                diag.add_error_at_line("input", &format!("unreadable load row: {err}"), idx + 2);
                continue;
            }
        };
        table
            .entry(CustomerId::new(row.customer_id))
            .or_insert_with(CustomerLoadProfile::default)
            .samples
            .push(LoadSample {
                real_kw: parse_number(row.real_kw.as_deref()),
                reactive_kvar: parse_number(row.reactive_kvar.as_deref()),
                voltage: parse_number(row.voltage.as_deref()),
            });
    }
    Ok(table)
}

#[derive(Debug, Deserialize)]
struct TransformerRow {
    timestamp: String,
    #[serde(default)]
    current_a: Option<String>,
    #[serde(default)]
    current_b: Option<String>,
    #[serde(default)]
    current_c: Option<String>,
    #[serde(default)]
    voltage_a: Option<String>,
    #[serde(default)]
    voltage_b: Option<String>,
    #[serde(default)]
    voltage_c: Option<String>,
    #[serde(default)]
    import_kw: Option<String>,
    #[serde(default)]
    import_kva: Option<String>,
    #[serde(default)]
    power_factor: Option<String>,
}

pub fn read_transformer(path: &Path, diag: &mut Diagnostics) -> Result<Vec<TransformerSample>> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening transformer CSV {}", path.display()))?;
    let mut samples = Vec::new();
    for (idx, result) in reader.deserialize::<TransformerRow>().enumerate() {
        let line = idx + 2;
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                diag.add_error_at_line("input", &format!("unreadable transformer row: {err}"), line);
                continue;
            }
        };
        let Some(timestamp) = parse_timestamp(&row.timestamp) else {
            diag.add_warning_at_line(
                "timestamp",
                &format!("unparseable timestamp '{}'", row.timestamp),
                line,
            );
            continue;
        };
        samples.push(TransformerSample {
            timestamp,
            current: [
                parse_number(row.current_a.as_deref()),
                parse_number(row.current_b.as_deref()),
                parse_number(row.current_c.as_deref()),
            ],
            voltage: [
                parse_number(row.voltage_a.as_deref()),
                parse_number(row.voltage_b.as_deref()),
                parse_number(row.voltage_c.as_deref()),
            ],
            import_kw: parse_number(row.import_kw.as_deref()),
            import_kva: parse_number(row.import_kva.as_deref()),
            power_factor: parse_number(row.power_factor.as_deref()),
        });
    }
    Ok(samples)
}

/// Write meters back out in the long format [`read_meters`] accepts.
pub fn write_meters(path: &Path, meters: &[CustomerMeter]) -> Result<()> {
    let mut writer = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("creating series CSV {}", path.display()))?;
    writer.write_record(["meter_id", "phase", "timestamp", "voltage"])?;
    for meter in meters {
        for series in &meter.phases {
            for sample in &series.samples {
                let phase = series.phase.letter().to_string();
                let timestamp = sample.timestamp.to_rfc3339();
                let voltage = sample.voltage.map(|v| v.to_string()).unwrap_or_default();
                writer.write_record([
                    meter.id.as_str(),
                    phase.as_str(),
                    timestamp.as_str(),
                    voltage.as_str(),
                ])?;
            }
        }
    }
    writer
        .flush()
        .with_context(|| format!("writing series CSV {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use phaseid_core::FeederId;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn csv_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn accepts_every_supported_timestamp_format() {
        for raw in [
            "2024-01-01T00:15:00Z",
            "2024-01-01T00:15:00+00:00",
            "2024-01-01 00:15:00",
            "2024-01-01T00:15:00",
            "01/01/2024 00:15:00",
        ] {
            let ts = parse_timestamp(raw).unwrap_or_else(|| panic!("{raw}"));
            assert_eq!(ts.to_rfc3339(), "2024-01-01T00:15:00+00:00");
        }
        // Day-first wins when both readings are valid.
        assert_eq!(
            parse_timestamp("02/03/2024 00:00:00").unwrap().to_rfc3339(),
            "2024-03-02T00:00:00+00:00"
        );
        // Only month-first can read a day of 13.
        assert_eq!(
            parse_timestamp("03/13/2024 00:00:00").unwrap().to_rfc3339(),
            "2024-03-13T00:00:00+00:00"
        );
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn groups_rows_by_meter_and_phase() {
        let file = csv_file(
            "meter_id,phase,timestamp,voltage\n\
             F1,A,2024-01-01T00:00:00Z,230.0\n\
             F1,Phase B,2024-01-01T00:00:00Z,231.0\n\
             F2,a,2024-01-01T00:00:00Z,229.0\n\
             F1,A,2024-01-01T00:15:00Z,230.5\n",
        );
        let mut diag = Diagnostics::new();
        let meters: Vec<Meter<FeederId>> = read_meters(file.path(), &mut diag).unwrap();
        assert_eq!(meters.len(), 2);
        assert_eq!(meters[0].id.as_str(), "F1");
        assert_eq!(meters[0].phase_count(), 2);
        assert_eq!(meters[0].phase(Phase::A).unwrap().len(), 2);
        assert_eq!(meters[1].id.as_str(), "F2");
        assert!(!diag.has_issues());
    }

    #[test]
    fn bad_cells_degrade_instead_of_failing() {
        let file = csv_file(
            "meter_id,phase,timestamp,voltage\n\
             C1,A,2024-01-01T00:00:00Z,n/a\n\
             C1,A,not a time,230\n\
             C1,Q,2024-01-01T00:30:00Z,230\n\
             C1,A,2024-01-01T00:45:00Z,\n\
             C1,A,2024-01-01T01:00:00Z,231\n",
        );
        let mut diag = Diagnostics::new();
        let meters: Vec<CustomerMeter> = read_meters(file.path(), &mut diag).unwrap();
        let series = meters[0].phase(Phase::A).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.unusable_count(), 2);
        assert_eq!(diag.issues_by_category("timestamp").count(), 1);
        assert_eq!(diag.issues_by_category("input").count(), 1);
        assert_eq!(diag.issues[0].line, Some(3));
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut diag = Diagnostics::new();
        let result: Result<Vec<CustomerMeter>> =
            read_meters(Path::new("/nonexistent/series.csv"), &mut diag);
        assert!(result.is_err());
    }

    #[test]
    fn loads_allow_blank_cells() {
        let file = csv_file(
            "customer_id,real_kw,reactive_kvar,voltage\n\
             C1,4.0,1.0,230\n\
             C1,6.0,,\n\
             C2,,,\n",
        );
        let mut diag = Diagnostics::new();
        let table = read_loads(file.path(), &mut diag).unwrap();
        let c1 = &table[&CustomerId::new("C1")];
        assert_eq!(c1.samples.len(), 2);
        assert_eq!(c1.mean_real_kw(), Some(5.0));
        assert_eq!(c1.mean_reactive_kvar(), Some(1.0));
        assert_eq!(table[&CustomerId::new("C2")].mean_real_kw(), None);
    }

    #[test]
    fn transformer_rows_parse_partial_phases() {
        let file = csv_file(
            "timestamp,current_a,current_b,current_c,voltage_a,voltage_b,voltage_c,import_kw,import_kva,power_factor\n\
             2024-01-01 00:00:00,10,12,,230,231,,50,55,0.9\n\
             garbage,1,1,1,1,1,1,1,1,1\n",
        );
        let mut diag = Diagnostics::new();
        let samples = read_transformer(file.path(), &mut diag).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].current, [Some(10.0), Some(12.0), None]);
        assert_eq!(samples[0].import_kva, Some(55.0));
        assert_eq!(diag.warning_count(), 1);
    }

    #[test]
    fn written_series_read_back() {
        let meter = CustomerMeter::new(CustomerId::new("C1")).with_phase(
            Phase::B,
            vec![Sample::new(
                parse_timestamp("2024-01-01T00:00:00Z").unwrap(),
                229.5,
            )],
        );
        let file = NamedTempFile::new().unwrap();
        write_meters(file.path(), std::slice::from_ref(&meter)).unwrap();
        let mut diag = Diagnostics::new();
        let back: Vec<CustomerMeter> = read_meters(file.path(), &mut diag).unwrap();
        assert_eq!(back, vec![meter]);
    }
}
