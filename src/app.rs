//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - sets up logging
//! - assembles the `MonitorConfig` (flags, `.env`, settings presets)
//! - dispatches to the dashboard, a single cycle, or headless polling

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, MonitorArgs, OnceArgs, TuiArgs, WatchArgs};
use crate::control::{Session, Trigger};
use crate::domain::{
    CONNECTION_STRING_ENV, MonitorConfig, StorageConfig, VariableSelection, load_presets, resolve_preset,
};
use crate::error::AppError;
use crate::plot::PlotSelection;

pub mod pipeline;

const DEFAULT_LOG_FILTER: &str = "bioprocess_monitor=info";

/// Entry point for the `biomon` binary.
pub fn run() -> Result<(), AppError> {
    // We want `biomon` and `biomon --source demo` to behave like `biomon tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    match cli.command {
        Command::Tui(args) => handle_tui(args),
        Command::Once(args) => handle_once(args),
        Command::Watch(args) => handle_watch(args),
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Log to stderr (headless commands).
fn init_stderr_logging() {
    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Log to a file (the dashboard owns the terminal).
fn init_file_logging(path: &Path) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::config(format!("Failed to create log file '{}': {e}", path.display())))?;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}

fn handle_tui(args: TuiArgs) -> Result<(), AppError> {
    init_file_logging(&args.log_file)?;
    let config = config_from_args(&args.monitor)?;
    crate::tui::run(config, args.monitor.auto_estimation)
}

fn handle_once(args: OnceArgs) -> Result<(), AppError> {
    init_stderr_logging();
    let config = config_from_args(&args.monitor)?;
    let monitor = pipeline::build_monitor(config)?;
    let mut session = Session::new(monitor.config(), args.monitor.auto_estimation);

    let outcome = monitor.run(session.request(Trigger::Initial));
    session.absorb(&outcome);

    let fits = crate::report::compute_fit_stats(&outcome.snapshot);
    println!(
        "{}",
        crate::report::format_cycle_summary(&outcome, monitor.config(), &fits)
    );

    if !args.no_plot && outcome.snapshot.has_data() {
        let selection = plot_selection(&args, &monitor.config().variables);
        let plots = crate::plot::render_snapshot_plots(&outcome.snapshot, &selection, args.width, args.height);
        println!("{plots}");
    }

    pipeline::write_outputs(&outcome, args.out.as_deref(), args.export_sim.as_deref())?;

    match outcome.error.message() {
        Some(message) => Err(AppError::runtime(format!("Cycle failed: {message}"))),
        None => Ok(()),
    }
}

fn handle_watch(args: WatchArgs) -> Result<(), AppError> {
    init_stderr_logging();
    let config = config_from_args(&args.monitor)?;
    let interval = config.poll_interval;
    let monitor = pipeline::build_monitor(config)?;
    let mut session = Session::new(monitor.config(), args.monitor.auto_estimation);

    let mut trigger = Trigger::Initial;
    let mut done = 0u64;
    loop {
        let outcome = monitor.run(session.request(trigger));
        session.absorb(&outcome);
        done += 1;

        match outcome.error.message() {
            None => println!(
                "{} | ok | {} params | {:.2}s",
                outcome.iteration_label,
                outcome.snapshot.params.len(),
                outcome.elapsed.as_secs_f64()
            ),
            Some(message) => println!("{} | error | {message}", outcome.iteration_label),
        }
        if let Err(err) = pipeline::write_outputs(&outcome, args.out.as_deref(), None) {
            tracing::warn!(error = %err, "failed to write snapshot");
        }

        if args.cycles.is_some_and(|n| done >= n) {
            return Ok(());
        }
        std::thread::sleep(interval);
        trigger = Trigger::Timer;
    }
}

/// What `biomon once` plots: the preset's variables unless narrowed by flags.
fn plot_selection(args: &OnceArgs, offered: &VariableSelection) -> PlotSelection {
    let measured = args.meas_vars.as_deref().unwrap_or(&offered.measurement_vars);
    let simulated = args.sim_vars.as_deref().unwrap_or(&offered.simulated_vars);
    let mut selection = PlotSelection::new(offered)
        .with_shown(measured, simulated)
        .with_secondary(&args.secondary, args.secondary_scale);
    selection.scale = args.scale;
    selection
}

/// Assemble the run configuration from flags, `.env` and the settings file.
pub fn config_from_args(args: &MonitorArgs) -> Result<MonitorConfig, AppError> {
    dotenvy::dotenv().ok();

    if args.interval == 0 {
        return Err(AppError::config("Polling interval must be at least one second."));
    }
    if !(args.points_per_hour.is_finite() && args.points_per_hour > 0.0) {
        return Err(AppError::config("Grid resolution must be a positive number of points per hour."));
    }

    let presets = match &args.settings {
        Some(path) => load_presets(path)?,
        None => Default::default(),
    };
    let preset = resolve_preset(&presets, &args.preset)?;

    let mut config = MonitorConfig {
        source: args.source,
        storage: StorageConfig {
            connection_string: std::env::var(CONNECTION_STRING_ENV).ok().filter(|s| !s.trim().is_empty()),
            share_name: args.share.clone(),
            measurement_path: args.measurement_path.clone(),
            metadata_path: args.metadata_path.clone(),
        },
        mirror_root: args.mirror.clone(),
        demo_seed: args.seed,
        work_dir: args.work_dir.clone(),
        experiment_dir: args.experiment_dir.clone(),
        poll_interval: Duration::from_secs(args.interval),
        horizon_hours: args.horizon,
        points_per_hour: args.points_per_hour,
        ..MonitorConfig::default()
    };
    config.apply_preset(preset);

    tracing::debug!(preset = %args.preset, config = ?config, "configuration assembled");
    Ok(config)
}

/// Rewrite argv so `biomon` defaults to `biomon tui`.
///
/// Rules:
/// - `biomon`                      -> `biomon tui`
/// - `biomon --source demo ...`    -> `biomon tui --source demo ...`
/// - `biomon --help/--version/-h`  -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(arg1.as_str(), "tui" | "once" | "watch");
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    argv
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use crate::domain::SourceKind;
    use crate::io::testutil::scratch_dir;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn monitor_args(extra: &[&str]) -> MonitorArgs {
        let mut parts = vec!["biomon", "once"];
        parts.extend_from_slice(extra);
        match Cli::parse_from(parts).command {
            Command::Once(args) => args.monitor,
            _ => unreachable!(),
        }
    }

    #[test]
    fn bare_invocation_opens_the_dashboard() {
        assert_eq!(rewrite_args(argv(&["biomon"])), argv(&["biomon", "tui"]));
        assert_eq!(
            rewrite_args(argv(&["biomon", "--source", "demo"])),
            argv(&["biomon", "tui", "--source", "demo"])
        );
        assert_eq!(rewrite_args(argv(&["biomon", "--help"])), argv(&["biomon", "--help"]));
        assert_eq!(
            rewrite_args(argv(&["biomon", "watch", "--cycles", "2"])),
            argv(&["biomon", "watch", "--cycles", "2"])
        );
    }

    fn once_args(extra: &[&str]) -> OnceArgs {
        let mut parts = vec!["biomon", "once"];
        parts.extend_from_slice(extra);
        match Cli::parse_from(parts).command {
            Command::Once(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn once_plots_follow_variable_flags() {
        let offered = VariableSelection::default();
        let all = plot_selection(&once_args(&[]), &offered);
        assert_eq!(all.panels(), vec!["cX", "cS", "cE", "CO2"]);
        assert!(all.shown("cS").simulated);

        let narrowed = plot_selection(
            &once_args(&["--meas-vars", "cX", "--sim-vars", "", "--secondary", "CO2", "--secondary-scale", "log"]),
            &offered,
        );
        assert_eq!(narrowed.panels(), vec!["cX"]);
        assert!(!narrowed.shown("cX").simulated);
        assert_eq!(narrowed.scale_for("CO2"), crate::domain::AxisScale::Log);
        assert_eq!(narrowed.scale_for("cX"), crate::domain::AxisScale::Linear);
    }

    #[test]
    fn flags_map_onto_the_config() {
        let args = monitor_args(&["--source", "demo", "--horizon", "24", "--interval", "30"]);
        let config = config_from_args(&args).unwrap();
        assert_eq!(config.source, SourceKind::Demo);
        assert_eq!(config.horizon_hours, 24.0);
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.storage.share_name, "biomoni-storage");
    }

    #[test]
    fn settings_preset_is_applied() {
        let dir = scratch_dir("settings");
        let path = dir.join("settings.json");
        std::fs::write(
            &path,
            r#"{"typ2": {"estimate": {"fit_variables": ["CO2"]}, "experiment": {"timestamp_column": "Zeit"}}}"#,
        )
        .unwrap();

        let path_arg = path.to_string_lossy().into_owned();
        let args = monitor_args(&["--settings", &path_arg, "--preset", "typ2"]);
        let config = config_from_args(&args).unwrap();
        assert_eq!(config.estimate.fit_variables, vec!["CO2".to_string()]);
        assert_eq!(config.experiment.timestamp_column, "Zeit");

        let missing = monitor_args(&["--settings", &path_arg, "--preset", "typ7"]);
        assert_eq!(config_from_args(&missing).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn zero_interval_is_a_config_error() {
        let args = monitor_args(&["--interval", "0"]);
        assert_eq!(config_from_args(&args).unwrap_err().exit_code(), 2);
    }
}
