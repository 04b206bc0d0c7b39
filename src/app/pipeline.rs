//! Shared wiring used by every front end.
//!
//! Keeping this in one place avoids duplicating the setup:
//! config -> fetcher -> control loop, and snapshot -> files.
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::path::Path;

use crate::control::{ControlLoop, RunOutcome};
use crate::data::{AzureFileShare, Fetcher, LocalMirror, SyntheticSource};
use crate::domain::{MonitorConfig, SourceKind};
use crate::error::AppError;
use crate::models::Yeast;

pub type DynFetcher = Box<dyn Fetcher + Send + Sync>;

/// The control loop every front end runs.
pub type Monitor = ControlLoop<DynFetcher, Yeast>;

/// Build the fetcher selected by `config.source`.
pub fn build_fetcher(config: &MonitorConfig) -> Result<DynFetcher, AppError> {
    match config.source {
        SourceKind::Azure => Ok(Box::new(AzureFileShare::from_config(&config.storage)?)),
        SourceKind::Local => {
            let root = config
                .mirror_root
                .clone()
                .ok_or_else(|| AppError::config("`--source local` needs `--mirror <DIR>`."))?;
            if !root.is_dir() {
                return Err(AppError::config(format!(
                    "Mirror directory '{}' does not exist.",
                    root.display()
                )));
            }
            Ok(Box::new(LocalMirror::new(root)))
        }
        SourceKind::Demo => Ok(Box::new(SyntheticSource::new(
            config.demo_seed,
            &config.storage,
            &config.experiment,
        ))),
    }
}

/// Build the control loop for `config`.
pub fn build_monitor(config: MonitorConfig) -> Result<Monitor, AppError> {
    let fetcher = build_fetcher(&config)?;
    tracing::info!(
        source = ?config.source,
        work_dir = %config.work_dir.display(),
        "monitor configured"
    );
    Ok(ControlLoop::yeast(config, fetcher))
}

/// Write the snapshot JSON and/or the simulated trajectory of a cycle.
pub fn write_outputs(
    outcome: &RunOutcome,
    snapshot_path: Option<&Path>,
    export_sim: Option<&Path>,
) -> Result<(), AppError> {
    if let Some(path) = snapshot_path {
        crate::io::write_snapshot_json(path, &outcome.snapshot)?;
    }
    if let Some(path) = export_sim {
        match outcome.snapshot.simulated_data.table() {
            Some(table) => crate::io::write_table_csv(path, table)?,
            None => tracing::warn!(path = %path.display(), "no simulation to export"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ErrorState, Session, Trigger};
    use crate::domain::AutoEstimation;
    use crate::io::testutil::scratch_dir;

    fn demo_config(tag: &str) -> MonitorConfig {
        MonitorConfig {
            source: SourceKind::Demo,
            work_dir: scratch_dir(tag),
            ..MonitorConfig::default()
        }
    }

    #[test]
    fn local_source_needs_a_mirror() {
        let config = MonitorConfig {
            source: SourceKind::Local,
            ..MonitorConfig::default()
        };
        assert_eq!(build_fetcher(&config).err().unwrap().exit_code(), 2);
    }

    #[test]
    fn azure_source_needs_a_connection_string() {
        let config = MonitorConfig::default();
        let err = build_fetcher(&config).err().unwrap();
        assert!(err.message().contains("STORAGE_CONNECTION_STRING"));
    }

    #[test]
    fn demo_monitor_runs_a_session() {
        let config = demo_config("pipeline-demo");
        let work_dir = config.work_dir.clone();
        let monitor = build_monitor(config).unwrap();
        let mut session = Session::new(monitor.config(), AutoEstimation::Disabled);

        let first = monitor.run(session.request(Trigger::Initial));
        assert_eq!(first.error, ErrorState::Clean, "{:?}", first.error);
        session.absorb(&first);

        let second = monitor.run(session.request(Trigger::Timer));
        assert_eq!(second.error, ErrorState::Clean);
        assert_eq!(second.iteration_label, "This is iteration: 1");
        // No estimation: the table replays unchanged.
        assert_eq!(second.snapshot.params, first.snapshot.params);

        let out = work_dir.join("out/snapshot.json");
        let sim = work_dir.join("sim.csv");
        write_outputs(&second, Some(&out), Some(&sim)).unwrap();
        assert_eq!(crate::io::read_snapshot_json(&out).unwrap(), second.snapshot);
        assert!(std::fs::read_to_string(sim).unwrap().starts_with("t,cX,cS,cE,CO2\n"));
    }
}
