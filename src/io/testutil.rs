//! Scratch directories and fixture files for tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

static COUNTER: AtomicUsize = AtomicUsize::new(0);

/// A fresh, empty directory under the system temp dir.
pub fn scratch_dir(tag: &str) -> PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::SeqCst);
    let dir = std::env::temp_dir().join(format!("biomon-{tag}-{}-{n}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Write the measurement and metadata files where the default
/// `ExperimentOptions` expect them inside an experiment directory.
pub fn write_experiment(dir: &Path, measurement_csv: &str, metadata_csv: &str) {
    fs::create_dir_all(dir.join("current_ferm")).unwrap();
    fs::write(dir.join("current_ferm/data.csv"), measurement_csv).unwrap();
    fs::write(dir.join("metadata_OPCUA.csv"), metadata_csv).unwrap();
}

/// A small but fittable fermentation record (offgas every 30 min, offline every 2 h).
pub fn fermentation_csv() -> String {
    let mut out = String::from("PDatTime,CO2,cX,cS,cE\n");
    for i in 0..=16 {
        let minutes = i * 30;
        let (h, m) = (8 + minutes / 60, minutes % 60);
        let t = minutes as f64 / 60.0;
        let co2 = 0.05 * (0.3 * t).exp();
        if i % 4 == 0 {
            let x = 0.2 * (0.25 * t).exp();
            let s = (20.0 - 2.0 * (x - 0.2) / 0.5).max(0.0);
            out.push_str(&format!("2024-03-01 {h:02}:{m:02}:00,{co2:.4},{x:.4},{s:.4},0.0\n"));
        } else {
            out.push_str(&format!("2024-03-01 {h:02}:{m:02}:00,{co2:.4},,,\n"));
        }
    }
    out
}

pub const FERMENTATION_METADATA: &str =
    "key,value\nexperiment,test-run\nstart,2024-03-01 08:00:00\nX0,0.2\nS0,20\nE0,0\n";
