//! Run configuration.
//!
//! All settings the control loop needs are collected into one `MonitorConfig`
//! that is built once (from CLI flags, the environment and an optional settings
//! file) and handed to the loop at construction time.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

pub const DEFAULT_SHARE_NAME: &str = "biomoni-storage";
pub const DEFAULT_MEASUREMENT_PATH: &str = "Measurement-data/current_ferm/data.csv";
pub const DEFAULT_METADATA_PATH: &str = "Measurement-data/metadata_OPCUA.csv";
pub const DEFAULT_EXPERIMENT_DIR: &str = "Measurement-data";
pub const CONNECTION_STRING_ENV: &str = "STORAGE_CONNECTION_STRING";
pub const DEFAULT_PRESET: &str = "typ1";

/// Where remote inputs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Azure Files share addressed by `STORAGE_CONNECTION_STRING`.
    Azure,
    /// A local directory laid out like the share.
    Local,
    /// Synthetic fermentation generated from the Yeast model.
    Demo,
}

/// Remote storage coordinates.
#[derive(Clone)]
pub struct StorageConfig {
    pub connection_string: Option<String>,
    pub share_name: String,
    pub measurement_path: String,
    pub metadata_path: String,
}

impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "<redacted>"),
            )
            .field("share_name", &self.share_name)
            .field("measurement_path", &self.measurement_path)
            .field("metadata_path", &self.metadata_path)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            share_name: DEFAULT_SHARE_NAME.to_string(),
            measurement_path: DEFAULT_MEASUREMENT_PATH.to_string(),
            metadata_path: DEFAULT_METADATA_PATH.to_string(),
        }
    }
}

/// How the local measurement files are turned into a dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentOptions {
    /// Measurement CSV, relative to the experiment directory.
    pub measurement_file: String,
    /// Metadata CSV (`key,value` rows), relative to the experiment directory.
    pub metadata_file: String,
    pub timestamp_column: String,
    /// `chrono` format of the timestamp column; RFC 3339 is tried as a fallback.
    pub timestamp_format: String,
    pub delimiter: char,
    /// Measurement type label -> columns belonging to that type.
    pub types: BTreeMap<String, Vec<String>>,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        let mut types = BTreeMap::new();
        types.insert("offgas".to_string(), vec!["CO2".to_string()]);
        types.insert(
            "offline".to_string(),
            vec!["cX".to_string(), "cS".to_string(), "cE".to_string()],
        );
        Self {
            measurement_file: "current_ferm/data.csv".to_string(),
            metadata_file: "metadata_OPCUA.csv".to_string(),
            timestamp_column: "PDatTime".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S".to_string(),
            delimiter: ',',
            types,
        }
    }
}

/// Options for parameter estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimateOptions {
    /// Model outputs that are fitted against equally named measured columns.
    pub fit_variables: Vec<String>,
    /// Residual weight per variable (missing = 1.0).
    pub weights: BTreeMap<String, f64>,
    pub max_iterations: usize,
    /// Stop when the relative cost reduction of an accepted step drops below this.
    pub ftol: f64,
    /// Stop when the relative step size drops below this.
    pub xtol: f64,
    /// Initial integrator step (hours); must not exceed the integration span.
    pub first_step: Option<f64>,
}

impl Default for EstimateOptions {
    fn default() -> Self {
        Self {
            fit_variables: vec![
                "cX".to_string(),
                "cS".to_string(),
                "cE".to_string(),
                "CO2".to_string(),
            ],
            weights: BTreeMap::new(),
            max_iterations: 60,
            ftol: 1e-8,
            xtol: 1e-8,
            first_step: None,
        }
    }
}

impl EstimateOptions {
    pub fn weight(&self, variable: &str) -> f64 {
        self.weights.get(variable).copied().unwrap_or(1.0)
    }
}

/// Which variables the dashboard offers for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableSelection {
    pub measurement_vars: Vec<String>,
    pub simulated_vars: Vec<String>,
}

impl Default for VariableSelection {
    fn default() -> Self {
        let vars: Vec<String> = ["cX", "cS", "cE", "CO2"].iter().map(|s| s.to_string()).collect();
        Self {
            measurement_vars: vars.clone(),
            simulated_vars: vars,
        }
    }
}

/// A named bundle of experiment/estimation/display options.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preset {
    pub experiment: ExperimentOptions,
    pub estimate: EstimateOptions,
    pub variables: VariableSelection,
}

/// Load presets from a JSON settings file (`{"typ1": {...}, "typ2": {...}}`).
pub fn load_presets(path: &Path) -> Result<BTreeMap<String, Preset>, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::config(format!("Failed to open settings '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::config(format!("Invalid settings '{}': {e}", path.display())))
}

/// Resolve a preset by name; `typ1` is always available as the built-in default.
pub fn resolve_preset(
    presets: &BTreeMap<String, Preset>,
    name: &str,
) -> Result<Preset, AppError> {
    if let Some(preset) = presets.get(name) {
        return Ok(preset.clone());
    }
    if name == DEFAULT_PRESET {
        return Ok(Preset::default());
    }
    let known: Vec<&str> = presets.keys().map(String::as_str).collect();
    Err(AppError::config(format!(
        "Unknown preset `{name}` (available: {}).",
        if known.is_empty() {
            DEFAULT_PRESET.to_string()
        } else {
            known.join(", ")
        }
    )))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Dashboard colours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub background: Rgb,
    pub text: Rgb,
    pub settings: Rgb,
    pub table_header: Rgb,
    pub table_background: Rgb,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Rgb(0x38, 0x34, 0x34),
            text: Rgb(0xf0, 0xff, 0xff),
            settings: Rgb(0x47, 0x4a, 0x50),
            table_header: Rgb(0x3a, 0x3f, 0x4b),
            table_background: Rgb(0x47, 0x4a, 0x50),
        }
    }
}

/// A full run's configuration as understood by the control loop.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source: SourceKind,
    pub storage: StorageConfig,
    /// Root of the local share mirror for `SourceKind::Local`.
    pub mirror_root: Option<PathBuf>,
    /// Seed for `SourceKind::Demo`.
    pub demo_seed: u64,
    /// Local working directory the remote files are downloaded into.
    pub work_dir: PathBuf,
    /// Experiment directory, relative to `work_dir`.
    pub experiment_dir: PathBuf,
    pub poll_interval: Duration,
    pub horizon_hours: f64,
    /// Simulation grid resolution (points per simulated hour).
    pub points_per_hour: f64,
    pub experiment: ExperimentOptions,
    pub estimate: EstimateOptions,
    pub variables: VariableSelection,
    pub theme: Theme,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Azure,
            storage: StorageConfig::default(),
            mirror_root: None,
            demo_seed: 7,
            work_dir: PathBuf::from("."),
            experiment_dir: PathBuf::from(DEFAULT_EXPERIMENT_DIR),
            poll_interval: Duration::from_secs(120),
            horizon_hours: 10.0,
            points_per_hour: 60.0,
            experiment: ExperimentOptions::default(),
            estimate: EstimateOptions::default(),
            variables: VariableSelection::default(),
            theme: Theme::default(),
        }
    }
}

impl MonitorConfig {
    pub fn experiment_path(&self) -> PathBuf {
        self.work_dir.join(&self.experiment_dir)
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.experiment = preset.experiment;
        self.estimate = preset.estimate;
        self.variables = preset.variables;
    }
}
