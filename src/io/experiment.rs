//! Experiment loading: measurement CSV + metadata CSV -> dataset.
//!
//! The measurement file is a wide CSV export (one timestamp column plus one
//! column per measured variable, empty cells where nothing was measured). The
//! metadata file holds `key,value` rows describing the run:
//!
//! ```text
//! key,value
//! experiment,F7
//! start,2024-03-01 08:00:00
//! end,2024-03-02 08:00:00
//! S0,20.0
//! ```
//!
//! Rows are placed on a process-time axis (hours since `start`, or since the
//! first timestamp when no start is given) and split into one table per
//! measurement type.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime};

use crate::domain::{ExperimentOptions, Table};
use crate::error::AppError;

/// Raised when no type ends up with any rows.
pub const EMPTY_DATASET: &str = "The Dataframe is empty";

const FALLBACK_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d.%m.%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parsed metadata file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub name: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Numeric entries (e.g. initial concentrations `X0`, `S0`, `E0`).
    pub values: BTreeMap<String, f64>,
    /// Everything else, verbatim.
    pub extra: BTreeMap<String, String>,
}

/// A loaded experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct Experiment {
    pub name: String,
    /// Process time zero.
    pub start: NaiveDateTime,
    /// Measurement type label -> time-indexed table.
    pub dataset: BTreeMap<String, Table>,
    pub metadata: Metadata,
    /// Rows skipped because their timestamp could not be parsed.
    pub skipped_rows: usize,
}

impl Experiment {
    /// Latest measured process time over all types.
    pub fn t_max(&self) -> f64 {
        self.dataset
            .values()
            .filter_map(Table::t_max)
            .fold(0.0, f64::max)
    }

    /// Non-missing observations of `variable` over all types.
    pub fn observations(&self, variable: &str) -> Vec<(f64, f64)> {
        let mut out: Vec<(f64, f64)> = self
            .dataset
            .values()
            .filter_map(|t| t.series(variable))
            .flatten()
            .collect();
        out.sort_by(|a, b| a.0.total_cmp(&b.0));
        out
    }
}

/// Load the experiment stored in `dir`.
pub fn load_experiment(dir: &Path, options: &ExperimentOptions) -> Result<Experiment, AppError> {
    let metadata = load_metadata(&dir.join(&options.metadata_file), options)?;
    let raw = read_measurements(&dir.join(&options.measurement_file), options)?;

    let start = match metadata.start {
        Some(start) => start,
        None => raw
            .rows
            .iter()
            .map(|(ts, _)| *ts)
            .min()
            .ok_or_else(|| AppError::data(EMPTY_DATASET))?,
    };

    let mut rows: Vec<(f64, &Vec<Option<f64>>)> = raw
        .rows
        .iter()
        .filter(|(ts, _)| *ts >= start && metadata.end.is_none_or(|end| *ts <= end))
        .map(|(ts, values)| (hours_between(start, *ts), values))
        .collect();
    rows.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut dataset = BTreeMap::new();
    for (label, columns) in &options.types {
        let positions: Vec<usize> = columns
            .iter()
            .map(|c| raw.column_position(c))
            .collect::<Result<_, _>>()?;

        let mut table = Table::new(columns.clone());
        for (t, values) in &rows {
            let row: Vec<Option<f64>> = positions.iter().map(|&p| values[p]).collect();
            if row.iter().any(Option::is_some) {
                table.push_row(*t, row)?;
            }
        }
        if !table.is_empty() {
            dataset.insert(label.clone(), table);
        }
    }

    if dataset.is_empty() {
        return Err(AppError::data(EMPTY_DATASET));
    }

    let name = metadata.name.clone().unwrap_or_else(|| {
        dir.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "experiment".to_string())
    });

    tracing::debug!(
        experiment = %name,
        types = dataset.len(),
        skipped = raw.skipped,
        "experiment loaded"
    );

    Ok(Experiment {
        name,
        start,
        dataset,
        metadata,
        skipped_rows: raw.skipped,
    })
}

struct RawMeasurements {
    columns: Vec<String>,
    rows: Vec<(NaiveDateTime, Vec<Option<f64>>)>,
    skipped: usize,
}

impl RawMeasurements {
    fn column_position(&self, name: &str) -> Result<usize, AppError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AppError::data(format!("Measurement file is missing column `{name}`.")))
    }
}

fn read_measurements(path: &Path, options: &ExperimentOptions) -> Result<RawMeasurements, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::data(format!("Failed to open measurement file '{}': {e}", path.display()))
    })?;
    let delimiter = csv_delimiter(options.delimiter)?;

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| AppError::data(format!("Failed to read measurement headers: {e}")))?
        .iter()
        .map(normalize_header_name)
        .collect();

    let ts_col = headers
        .iter()
        .position(|h| *h == options.timestamp_column)
        .ok_or_else(|| {
            AppError::data(format!(
                "Measurement file is missing timestamp column `{}`.",
                options.timestamp_column
            ))
        })?;

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (idx, record) in reader.records().enumerate() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(line = idx + 2, error = %e, "skipping unreadable row");
                skipped += 1;
                continue;
            }
        };
        let Some(ts) = record
            .get(ts_col)
            .and_then(|s| parse_timestamp(s, &options.timestamp_format))
        else {
            skipped += 1;
            continue;
        };
        let values = (0..headers.len())
            .map(|j| if j == ts_col { None } else { record.get(j).and_then(parse_number) })
            .collect();
        rows.push((ts, values));
    }

    Ok(RawMeasurements {
        columns: headers,
        rows,
        skipped,
    })
}

/// Read the `key,value` metadata file.
pub fn load_metadata(path: &Path, options: &ExperimentOptions) -> Result<Metadata, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::data(format!("Failed to open metadata file '{}': {e}", path.display()))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(csv_delimiter(options.delimiter)?)
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut meta = Metadata::default();
    for record in reader.records() {
        let record = record.map_err(|e| AppError::data(format!("Invalid metadata row: {e}")))?;
        let Some(key) = record.get(0).map(normalize_header_name) else {
            continue;
        };
        let value = record.get(1).unwrap_or("").to_string();
        if key.is_empty() || key.eq_ignore_ascii_case("key") {
            continue;
        }

        match key.to_ascii_lowercase().as_str() {
            "experiment" | "name" => meta.name = Some(value),
            "start" | "end" => {
                let ts = parse_timestamp(&value, &options.timestamp_format).ok_or_else(|| {
                    AppError::data(format!("Invalid `{key}` timestamp in metadata: '{value}'"))
                })?;
                if key.eq_ignore_ascii_case("start") {
                    meta.start = Some(ts);
                } else {
                    meta.end = Some(ts);
                }
            }
            _ => match parse_number(&value) {
                Some(v) => {
                    meta.values.insert(key, v);
                }
                None => {
                    meta.extra.insert(key, value);
                }
            },
        }
    }
    Ok(meta)
}

fn csv_delimiter(delimiter: char) -> Result<u8, AppError> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| AppError::config(format!("CSV delimiter must be ASCII, got '{delimiter}'.")))
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}').to_string()
}

/// Parse a timestamp with the configured format, then a few common fallbacks.
pub fn parse_timestamp(raw: &str, format: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, format) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.naive_utc());
    }
    FALLBACK_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let v = s
        .parse::<f64>()
        .ok()
        .or_else(|| s.replace(',', ".").parse::<f64>().ok())?;
    v.is_finite().then_some(v)
}

fn hours_between(start: NaiveDateTime, ts: NaiveDateTime) -> f64 {
    (ts - start).num_milliseconds() as f64 / 3_600_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::testutil::{scratch_dir, write_experiment};

    #[test]
    fn splits_rows_into_types_on_process_time() {
        let dir = scratch_dir("loader-split");
        write_experiment(
            &dir,
            "PDatTime,CO2,cX,cS,cE\n\
             2024-03-01 08:00:00,0.10,0.1,20.0,\n\
             2024-03-01 09:00:00,0.20,,,\n\
             2024-03-01 10:30:00,0.35,0.4,17.5,0.9\n",
            "key,value\nexperiment,F7\nstart,2024-03-01 08:00:00\nS0,20\n",
        );

        let exp = load_experiment(&dir, &ExperimentOptions::default()).unwrap();
        assert_eq!(exp.name, "F7");
        assert_eq!(exp.metadata.values.get("S0"), Some(&20.0));

        let offgas = &exp.dataset["offgas"];
        assert_eq!(offgas.index, vec![0.0, 1.0, 2.5]);

        let offline = &exp.dataset["offline"];
        assert_eq!(offline.len(), 2);
        assert_eq!(offline.data[0], vec![Some(0.1), Some(20.0), None]);
        assert_eq!(exp.observations("cE"), vec![(2.5, 0.9)]);
        assert_eq!(exp.t_max(), 2.5);
    }

    #[test]
    fn rows_outside_the_run_window_are_dropped() {
        let dir = scratch_dir("loader-window");
        write_experiment(
            &dir,
            "PDatTime,CO2,cX,cS,cE\n\
             2024-03-01 07:00:00,0.05,,,\n\
             2024-03-01 08:30:00,0.10,,,\n\
             2024-03-01 12:00:00,0.90,,,\n",
            "key,value\nstart,2024-03-01 08:00:00\nend,2024-03-01 10:00:00\n",
        );

        let exp = load_experiment(&dir, &ExperimentOptions::default()).unwrap();
        assert_eq!(exp.dataset["offgas"].index, vec![0.5]);
        assert!(!exp.dataset.contains_key("offline"));
    }

    #[test]
    fn no_usable_rows_reports_empty_dataframe() {
        let dir = scratch_dir("loader-empty");
        write_experiment(&dir, "PDatTime,CO2,cX,cS,cE\n", "key,value\n");

        let err = load_experiment(&dir, &ExperimentOptions::default()).unwrap_err();
        assert_eq!(err.to_string(), EMPTY_DATASET);
    }

    #[test]
    fn missing_column_is_named() {
        let dir = scratch_dir("loader-missing");
        write_experiment(
            &dir,
            "PDatTime,CO2\n2024-03-01 08:00:00,0.1\n",
            "key,value\n",
        );
        let err = load_experiment(&dir, &ExperimentOptions::default()).unwrap_err();
        assert!(err.to_string().contains("`cX`"), "{err}");
    }

    #[test]
    fn timestamps_and_numbers_accept_common_variants() {
        assert!(parse_timestamp("2024-03-01T08:00:00Z", "%Y-%m-%d %H:%M:%S").is_some());
        assert!(parse_timestamp("01.03.2024 08:00:00", "%Y-%m-%d %H:%M:%S").is_some());
        assert!(parse_timestamp("yesterday", "%Y-%m-%d %H:%M:%S").is_none());
        assert_eq!(parse_number("1,5"), Some(1.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("NaN"), None);
    }
}
