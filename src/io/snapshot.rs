//! Read/write snapshot JSON files.
//!
//! The snapshot file is the same document the dashboard consumes, so a file
//! written by `biomon watch` can be inspected or replayed later.

use std::fs::{self, File};
use std::path::Path;

use crate::domain::Snapshot;
use crate::error::AppError;

/// Write a snapshot JSON file.
///
/// The document is written to a sibling temp file first and then renamed, so
/// readers polling the path never see a half-written snapshot.
pub fn write_snapshot_json(path: &Path, snapshot: &Snapshot) -> Result<(), AppError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::runtime(format!("Failed to create '{}': {e}", parent.display()))
        })?;
    }

    let tmp = path.with_extension("json.tmp");
    let file = File::create(&tmp).map_err(|e| {
        AppError::runtime(format!("Failed to create snapshot '{}': {e}", tmp.display()))
    })?;
    serde_json::to_writer(file, snapshot)
        .map_err(|e| AppError::runtime(format!("Failed to write snapshot JSON: {e}")))?;
    fs::rename(&tmp, path).map_err(|e| {
        AppError::runtime(format!("Failed to move snapshot into '{}': {e}", path.display()))
    })?;

    Ok(())
}

/// Read a snapshot JSON file.
pub fn read_snapshot_json(path: &Path) -> Result<Snapshot, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::data(format!("Failed to open snapshot '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file).map_err(|e| AppError::data(format!("Invalid snapshot JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ParamEntry, ParamMap, Table};
    use crate::io::testutil::scratch_dir;
    use std::collections::BTreeMap;

    #[test]
    fn failed_run_snapshot_survives_disk() {
        let dir = scratch_dir("snapshot-io");
        let path = dir.join("out/snapshot.json");
        write_snapshot_json(&path, &Snapshot::empty()).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw, r#"{"measured_data":{},"simulated_data":{},"params":{}}"#);
        assert_eq!(read_snapshot_json(&path).unwrap(), Snapshot::empty());
    }

    #[test]
    fn solver_floats_read_back_bit_for_bit() {
        // Values like these come straight out of the integrator and the fit.
        let awkward = [0.9518244447924431, 0.1 + 0.2, 1.0 / 3.0, 2.220446049250313e-16, 18.873926115089614];

        let mut sim = Table::new(vec!["cX".to_string()]);
        for (i, &v) in awkward.iter().enumerate() {
            sim.push_row(i as f64 / 60.0, vec![Some(v)]).unwrap();
        }
        let params: ParamMap = [ParamEntry {
            name: "qsmax".to_string(),
            value: awkward[0],
            vary: "True".to_string(),
            min: 0.5,
            max: 4.0,
        }]
        .into_iter()
        .collect();
        let snapshot = Snapshot::new(BTreeMap::new(), sim, params);

        let path = scratch_dir("snapshot-floats").join("snapshot.json");
        write_snapshot_json(&path, &snapshot).unwrap();
        let back = read_snapshot_json(&path).unwrap();

        assert_eq!(back, snapshot);
        let table = back.simulated_data.table().unwrap();
        for (row, &v) in table.data.iter().zip(&awkward) {
            assert_eq!(row[0].map(f64::to_bits), Some(v.to_bits()));
        }
    }
}
