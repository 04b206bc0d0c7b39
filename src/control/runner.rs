//! The control loop: one cycle per trigger.
//!
//! A cycle fetches the remote inputs, loads the experiment, builds a fresh
//! model, optionally estimates, simulates over the requested horizon and
//! packs everything into a `Snapshot`. Failures never escape a cycle: they
//! become an empty snapshot plus `ErrorState::Errored`.

use std::time::{Duration, Instant};

use crate::control::{ErrorState, Plan, RunGuard, Trigger, display_message, plan};
use crate::data::Fetcher;
use crate::domain::{AutoEstimation, MonitorConfig, ParamRow, Snapshot, VaryFlag};
use crate::error::AppError;
use crate::fit::EstimationReport;
use crate::io::{Experiment, load_experiment};
use crate::math::time_grid;
use crate::models::{ProcessModel, Yeast, YeastKinetics};

/// Builds a fresh model for a loaded experiment.
pub type ModelFactory<M> = Box<dyn Fn(&Experiment) -> Result<M, AppError> + Send + Sync>;

/// Everything a cycle needs from the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub trigger: Trigger,
    pub horizon_hours: f64,
    pub auto_estimation: AutoEstimation,
    /// The parameter table as last shown (and possibly edited).
    pub params: Vec<ParamRow>,
    pub error: ErrorState,
    pub iteration: u64,
}

/// The result of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub snapshot: Snapshot,
    pub error: ErrorState,
    pub plan: Plan,
    pub estimation: Option<EstimationReport>,
    pub iteration_label: String,
    pub elapsed: Duration,
}

pub struct ControlLoop<F, M> {
    config: MonitorConfig,
    fetcher: F,
    factory: ModelFactory<M>,
    guard: RunGuard,
}

impl<F: Fetcher> ControlLoop<F, Yeast> {
    /// A loop running the Yeast model seeded from each experiment's metadata.
    pub fn yeast(config: MonitorConfig, fetcher: F) -> Self {
        Self::new(config, fetcher, |exp: &Experiment| Yeast::for_experiment(YeastKinetics, exp))
    }
}

impl<F: Fetcher, M: ProcessModel> ControlLoop<F, M> {
    pub fn new<B>(config: MonitorConfig, fetcher: F, factory: B) -> Self
    where
        B: Fn(&Experiment) -> Result<M, AppError> + Send + Sync + 'static,
    {
        Self {
            config,
            fetcher,
            factory: Box::new(factory),
            guard: RunGuard::new(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    /// Run one cycle, waiting for a running one to finish first.
    pub fn run(&self, request: RunRequest) -> RunOutcome {
        let _permit = self.guard.acquire();
        self.execute(request)
    }

    /// Run one cycle unless another one is in flight.
    pub fn try_run(&self, request: RunRequest) -> Option<RunOutcome> {
        let _permit = self.guard.try_acquire()?;
        Some(self.execute(request))
    }

    fn execute(&self, request: RunRequest) -> RunOutcome {
        let plan = plan(request.trigger, &request.error, request.auto_estimation);
        let started = Instant::now();
        tracing::info!(trigger = ?request.trigger, plan = ?plan, horizon = request.horizon_hours, "cycle started");

        let (snapshot, error, estimation) = match self.cycle(plan, &request) {
            Ok((snapshot, estimation)) => (snapshot, ErrorState::Clean, estimation),
            Err(err) => {
                let message = display_message(err.message());
                tracing::warn!(error = %err, "cycle failed");
                (Snapshot::empty(), ErrorState::Errored(message), None)
            }
        };

        let elapsed = started.elapsed();
        tracing::info!(
            trigger = ?request.trigger,
            ok = !error.is_errored(),
            elapsed_ms = elapsed.as_millis() as u64,
            "cycle finished"
        );

        RunOutcome {
            snapshot,
            error,
            plan,
            estimation,
            iteration_label: format!("This is iteration: {}", request.iteration),
            elapsed,
        }
    }

    fn cycle(
        &self,
        plan: Plan,
        request: &RunRequest,
    ) -> Result<(Snapshot, Option<EstimationReport>), AppError> {
        let hours = request.horizon_hours;
        if !(hours.is_finite() && hours > 0.0) {
            return Err(AppError::config(format!(
                "Simulation horizon must be a positive number of hours, got {hours}."
            )));
        }

        let storage = &self.config.storage;
        let work_dir = &self.config.work_dir;
        self.fetcher.fetch(&storage.measurement_path, work_dir)?;
        if plan == Plan::FullRefresh {
            self.fetcher.fetch(&storage.metadata_path, work_dir)?;
        }

        let experiment = load_experiment(&self.config.experiment_path(), &self.config.experiment)?;
        let mut model = (self.factory)(&experiment)?;

        if let Plan::Incremental { .. } = plan {
            for row in &request.params {
                model.change_params(&row.name, VaryFlag::coerce(&row.vary), row.value, row.min, row.max)?;
            }
        }

        let estimation = if plan.estimates() {
            Some(model.estimate(&experiment, &self.config.estimate)?)
        } else {
            None
        };

        let grid = time_grid(hours, self.config.points_per_hour);
        let simulated = model.simulate(&experiment, &grid)?;
        let params = model.params().entries();

        Ok((Snapshot::new(experiment.dataset, simulated, params), estimation))
    }
}
