//! Synthetic fermentation data for offline demos.
//!
//! The measurement file is produced by simulating the Yeast model with a fixed
//! "true" parameter set and adding multiplicative Gaussian noise. Every fetch
//! of the measurement file advances the run by `step_hours`, so a polling
//! session sees new rows arrive the way a live fermentation would.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, NaiveDate, NaiveDateTime};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::data::storage::{Fetcher, local_target};
use crate::domain::{ExperimentOptions, StorageConfig, VaryFlag};
use crate::error::AppError;
use crate::io::{Experiment, Metadata};
use crate::models::{ProcessModel, Yeast, YeastKinetics};

/// Parameters the synthetic run is generated with (differ from the defaults).
const TRUTH: [(&str, f64); 3] = [("qsmax", 1.8), ("qsox_max", 0.3), ("qemax", 0.15)];

const OFFGAS_PER_HOUR: usize = 6;
const OFFLINE_EVERY_HOURS: usize = 2;
const NOISE_REL: f64 = 0.03;

#[derive(Debug)]
pub struct SyntheticSource {
    seed: u64,
    measurement_path: String,
    metadata_path: String,
    timestamp_column: String,
    timestamp_format: String,
    start: NaiveDateTime,
    initial_hours: f64,
    step_hours: f64,
    max_hours: f64,
    fetches: AtomicUsize,
}

impl SyntheticSource {
    pub fn new(seed: u64, storage: &StorageConfig, experiment: &ExperimentOptions) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1)
            .and_then(|d| d.and_hms_opt(8, 0, 0))
            .unwrap_or_default();
        Self {
            seed,
            measurement_path: storage.measurement_path.clone(),
            metadata_path: storage.metadata_path.clone(),
            timestamp_column: experiment.timestamp_column.clone(),
            timestamp_format: experiment.timestamp_format.clone(),
            start,
            initial_hours: 6.0,
            step_hours: 0.5,
            max_hours: 24.0,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Process time covered by the next measurement file.
    fn next_elapsed(&self) -> f64 {
        let n = self.fetches.fetch_add(1, Ordering::Relaxed);
        (self.initial_hours + n as f64 * self.step_hours).min(self.max_hours)
    }

    fn truth_model(&self) -> Result<Yeast, AppError> {
        let mut model = Yeast::new(YeastKinetics)?;
        for (name, value) in TRUTH {
            let p = model
                .params()
                .get(name)
                .cloned()
                .ok_or_else(|| AppError::runtime(format!("Unknown parameter `{name}`.")))?;
            model.change_params(name, VaryFlag::Bool(p.vary), value, p.min, p.max)?;
        }
        Ok(model)
    }

    fn write_measurements(&self, path: &Path, elapsed: f64) -> Result<(), AppError> {
        let model = self.truth_model()?;
        let n = (elapsed * OFFGAS_PER_HOUR as f64).floor() as usize;
        let times: Vec<f64> = (0..=n).map(|i| i as f64 / OFFGAS_PER_HOUR as f64).collect();

        let placeholder = Experiment {
            name: "demo".to_string(),
            start: self.start,
            dataset: Default::default(),
            metadata: Metadata::default(),
            skipped_rows: 0,
        };
        let sim = model.simulate(&placeholder, &times)?;

        let mut rng = StdRng::seed_from_u64(self.seed);
        let normal = Normal::new(0.0, NOISE_REL)
            .map_err(|e| AppError::runtime(format!("Noise distribution error: {e}")))?;
        let mut noisy = |v: f64| (v * (1.0 + normal.sample(&mut rng))).max(0.0);

        let file = File::create(path)
            .map_err(|e| AppError::runtime(format!("Failed to create '{}': {e}", path.display())))?;
        let mut writer = csv::Writer::from_writer(file);
        let write_err = |e: csv::Error| AppError::runtime(format!("Failed to write demo CSV: {e}"));

        writer
            .write_record([self.timestamp_column.as_str(), "CO2", "cX", "cS", "cE"])
            .map_err(write_err)?;

        let offline_every = OFFGAS_PER_HOUR * OFFLINE_EVERY_HOURS;
        for (i, (t, row)) in sim.index.iter().zip(&sim.data).enumerate() {
            let ts = self.start + Duration::seconds((t * 3600.0).round() as i64);
            let value = |k: usize| row.get(k).copied().flatten().unwrap_or(0.0);

            let mut record = vec![
                ts.format(&self.timestamp_format).to_string(),
                format!("{:.5}", noisy(value(3))),
            ];
            if i % offline_every == 0 {
                for k in 0..3 {
                    record.push(format!("{:.4}", noisy(value(k))));
                }
            } else {
                record.extend(std::iter::repeat_n(String::new(), 3));
            }
            writer.write_record(&record).map_err(write_err)?;
        }

        writer
            .flush()
            .map_err(|e| AppError::runtime(format!("Failed to flush demo CSV: {e}")))?;
        tracing::debug!(hours = elapsed, rows = sim.len(), "generated demo measurements");
        Ok(())
    }

    fn write_metadata(&self, path: &Path) -> Result<(), AppError> {
        let model = self.truth_model()?;
        let params = model.params();
        let mut txt = String::from("key,value\nexperiment,demo\n");
        txt.push_str(&format!("start,{}\n", self.start.format(&self.timestamp_format)));
        for name in ["X0", "S0", "E0"] {
            txt.push_str(&format!("{name},{}\n", params.value(name)?));
        }
        fs::write(path, txt)
            .map_err(|e| AppError::runtime(format!("Failed to write '{}': {e}", path.display())))
    }
}

impl Fetcher for SyntheticSource {
    fn fetch(&self, remote_path: &str, local_root: &Path) -> Result<PathBuf, AppError> {
        let target = local_target(remote_path, local_root)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::runtime(format!("Failed to create '{}': {e}", parent.display()))
            })?;
        }

        if remote_path == self.measurement_path {
            self.write_measurements(&target, self.next_elapsed())?;
        } else if remote_path == self.metadata_path {
            self.write_metadata(&target)?;
        } else {
            return Err(AppError::runtime(format!(
                "The demo source has no file '{remote_path}'."
            )));
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::load_experiment;
    use crate::io::testutil::scratch_dir;
    use crate::domain::MonitorConfig;

    #[test]
    fn demo_files_load_as_an_experiment() {
        let config = MonitorConfig::default();
        let source = SyntheticSource::new(7, &config.storage, &config.experiment);
        let work = scratch_dir("demo");

        source.fetch(&config.storage.measurement_path, &work).unwrap();
        source.fetch(&config.storage.metadata_path, &work).unwrap();

        let exp = load_experiment(&work.join(&config.experiment_dir), &config.experiment).unwrap();
        assert_eq!(exp.name, "demo");
        assert_eq!(exp.metadata.values["S0"], 20.0);
        // 6 h of off-gas every 10 min, offline every 2 h.
        assert_eq!(exp.dataset["offgas"].len(), 37);
        assert_eq!(exp.dataset["offline"].len(), 4);
    }

    #[test]
    fn each_measurement_fetch_extends_the_run() {
        let config = MonitorConfig::default();
        let source = SyntheticSource::new(7, &config.storage, &config.experiment);
        let work = scratch_dir("demo-grow");

        source.fetch(&config.storage.metadata_path, &work).unwrap();
        source.fetch(&config.storage.measurement_path, &work).unwrap();
        let first = load_experiment(&work.join(&config.experiment_dir), &config.experiment).unwrap();
        source.fetch(&config.storage.measurement_path, &work).unwrap();
        let second = load_experiment(&work.join(&config.experiment_dir), &config.experiment).unwrap();

        assert!(second.t_max() > first.t_max());
        // Same seed: the rows both files share are identical.
        let a = &first.dataset["offgas"];
        let b = &second.dataset["offgas"];
        assert_eq!(a.data[..], b.data[..a.len()]);
    }

    #[test]
    fn unknown_paths_are_rejected() {
        let config = MonitorConfig::default();
        let source = SyntheticSource::new(7, &config.storage, &config.experiment);
        assert!(source.fetch("elsewhere/file.csv", &scratch_dir("demo-x")).is_err());
    }
}
