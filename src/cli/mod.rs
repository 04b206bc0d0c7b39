//! Command-line parsing for the bioprocess monitor.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the control loop and modeling code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{
    AutoEstimation, AxisScale, DEFAULT_EXPERIMENT_DIR, DEFAULT_MEASUREMENT_PATH, DEFAULT_METADATA_PATH,
    DEFAULT_PRESET, DEFAULT_SHARE_NAME, SourceKind,
};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "biomon", version, about = "Bioprocess monitor: poll measurements, fit a kinetic model, show the forecast")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Launch the interactive dashboard.
    ///
    /// Polls the storage every `--interval` seconds, re-simulates on horizon
    /// changes and lets you edit the parameter table.
    Tui(TuiArgs),
    /// Run a single full cycle, print the report and exit.
    Once(OnceArgs),
    /// Poll headlessly, writing every snapshot to disk.
    Watch(WatchArgs),
}

/// Options shared by every front end.
#[derive(Debug, Args, Clone)]
pub struct MonitorArgs {
    /// Where the measurement files come from.
    #[arg(long, value_enum, default_value_t = SourceKind::Azure)]
    pub source: SourceKind,

    /// Local directory laid out like the share (for `--source local`).
    #[arg(long, value_name = "DIR")]
    pub mirror: Option<PathBuf>,

    /// Seed of the synthetic fermentation (for `--source demo`).
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Azure Files share name.
    #[arg(long, default_value = DEFAULT_SHARE_NAME)]
    pub share: String,

    /// Remote path of the measurement CSV.
    #[arg(long, default_value = DEFAULT_MEASUREMENT_PATH)]
    pub measurement_path: String,

    /// Remote path of the metadata CSV.
    #[arg(long, default_value = DEFAULT_METADATA_PATH)]
    pub metadata_path: String,

    /// Local directory remote files are downloaded into.
    #[arg(long, default_value = ".")]
    pub work_dir: PathBuf,

    /// Experiment directory, relative to `--work-dir`.
    #[arg(long, default_value = DEFAULT_EXPERIMENT_DIR)]
    pub experiment_dir: PathBuf,

    /// Simulation horizon (hours).
    #[arg(long, default_value_t = 10.0)]
    pub horizon: f64,

    /// Simulation grid resolution (points per simulated hour).
    #[arg(long, default_value_t = 60.0)]
    pub points_per_hour: f64,

    /// Polling interval (seconds).
    #[arg(long, default_value_t = 120)]
    pub interval: u64,

    /// Whether timer cycles run parameter estimation.
    #[arg(long, value_enum, default_value_t = AutoEstimation::Enabled)]
    pub auto_estimation: AutoEstimation,

    /// JSON settings file with named presets.
    #[arg(long, value_name = "JSON")]
    pub settings: Option<PathBuf>,

    /// Preset to use from the settings file.
    #[arg(long, default_value = DEFAULT_PRESET)]
    pub preset: String,
}

#[derive(Debug, Args, Clone)]
pub struct TuiArgs {
    #[command(flatten)]
    pub monitor: MonitorArgs,

    /// Log file (the terminal is owned by the dashboard).
    #[arg(long, default_value = "biomon.log")]
    pub log_file: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct OnceArgs {
    #[command(flatten)]
    pub monitor: MonitorArgs,

    /// Write the snapshot JSON here.
    #[arg(long, value_name = "JSON")]
    pub out: Option<PathBuf>,

    /// Export the simulated trajectory to CSV.
    #[arg(long = "export-sim", value_name = "CSV")]
    pub export_sim: Option<PathBuf>,

    /// Disable the terminal plots.
    #[arg(long)]
    pub no_plot: bool,

    /// Y-axis scale of the terminal plots.
    #[arg(long, value_enum, default_value_t = AxisScale::Linear)]
    pub scale: AxisScale,

    /// Measured variables to plot (default: every measured variable of the preset).
    #[arg(long, value_delimiter = ',', value_name = "VARS")]
    pub meas_vars: Option<Vec<String>>,

    /// Simulated variables to plot (default: every simulated output of the preset).
    #[arg(long, value_delimiter = ',', value_name = "VARS")]
    pub sim_vars: Option<Vec<String>>,

    /// Variables plotted against the secondary y axis.
    #[arg(long, value_delimiter = ',', value_name = "VARS")]
    pub secondary: Vec<String>,

    /// Y-axis scale of the secondary-axis plots.
    #[arg(long, value_enum, default_value_t = AxisScale::Linear)]
    pub secondary_scale: AxisScale,

    /// Plot width (columns).
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,
}

#[derive(Debug, Args, Clone)]
pub struct WatchArgs {
    #[command(flatten)]
    pub monitor: MonitorArgs,

    /// Write each snapshot JSON here (overwritten every cycle).
    #[arg(long, value_name = "JSON")]
    pub out: Option<PathBuf>,

    /// Stop after this many cycles (including the initial one).
    #[arg(long)]
    pub cycles: Option<u64>,
}
