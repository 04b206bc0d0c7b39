//! The `ProcessModel` seam and the generic ODE-backed `Model<K>`.
//!
//! `Kinetics` implementations provide the pure pieces (parameter defaults,
//! right-hand side, observable outputs); `Model<K>` adds the parameter state,
//! simulation over a time grid and fitting against an experiment.

use crate::domain::{EstimateOptions, Table, VaryFlag};
use crate::error::AppError;
use crate::fit::{EstimationReport, LmSettings, Observations, levenberg_marquardt};
use crate::io::Experiment;
use crate::math::{OdeOptions, integrate};
use crate::models::Parameters;

/// What the control loop needs from a model.
pub trait ProcessModel {
    /// The full parameter mapping.
    fn params(&self) -> &Parameters;

    /// Replace value, bounds and vary flag of one named parameter.
    fn change_params(
        &mut self,
        name: &str,
        vary: VaryFlag,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), AppError>;

    /// Fit the vary-enabled parameters against the experiment's dataset.
    fn estimate(
        &mut self,
        experiment: &Experiment,
        options: &EstimateOptions,
    ) -> Result<EstimationReport, AppError>;

    /// Predict the model outputs over `t_grid` (hours, ascending).
    fn simulate(&self, experiment: &Experiment, t_grid: &[f64]) -> Result<Table, AppError>;
}

/// Kinetic equations of a process model.
pub trait Kinetics: Send + Sync {
    /// Parameter values unpacked for fast evaluation.
    type Coefficients: Send + Sync;

    fn name(&self) -> &'static str;
    fn state_names(&self) -> &'static [&'static str];
    fn output_names(&self) -> &'static [&'static str];
    fn default_params(&self) -> Result<Parameters, AppError>;
    fn coefficients(&self, params: &Parameters) -> Result<Self::Coefficients, AppError>;
    fn initial_state(&self, c: &Self::Coefficients) -> Vec<f64>;
    fn rhs(&self, c: &Self::Coefficients, t: f64, x: &[f64], dx: &mut [f64]);
    fn outputs(&self, c: &Self::Coefficients, x: &[f64], out: &mut [f64]);
}

/// A parameterised kinetic model.
#[derive(Debug, Clone)]
pub struct Model<K> {
    kinetics: K,
    params: Parameters,
    ode: OdeOptions,
}

impl<K: Kinetics> Model<K> {
    pub fn new(kinetics: K) -> Result<Self, AppError> {
        let params = kinetics.default_params()?;
        Ok(Self {
            kinetics,
            params,
            ode: OdeOptions::default(),
        })
    }

    /// A fresh model whose parameters are seeded from the experiment metadata:
    /// every numeric metadata entry named like a parameter (e.g. `S0`) sets it.
    pub fn for_experiment(kinetics: K, experiment: &Experiment) -> Result<Self, AppError> {
        let mut model = Self::new(kinetics)?;
        for (key, &value) in &experiment.metadata.values {
            if model.params.get(key).is_some() {
                model.params.seed_value(key, value)?;
            }
        }
        Ok(model)
    }

    pub fn with_ode_options(mut self, ode: OdeOptions) -> Self {
        self.ode = ode;
        self
    }

    pub fn kinetics(&self) -> &K {
        &self.kinetics
    }
}

impl<K: Kinetics> ProcessModel for Model<K> {
    fn params(&self) -> &Parameters {
        &self.params
    }

    fn change_params(
        &mut self,
        name: &str,
        vary: VaryFlag,
        value: f64,
        min: f64,
        max: f64,
    ) -> Result<(), AppError> {
        let vary = match vary {
            VaryFlag::Bool(b) => b,
            VaryFlag::Raw(text) => {
                return Err(AppError::config(format!(
                    "Invalid vary flag '{text}' for parameter '{name}' (expected true or false)"
                )));
            }
        };
        self.params.set(name, vary, value, min, max)
    }

    fn estimate(
        &mut self,
        experiment: &Experiment,
        options: &EstimateOptions,
    ) -> Result<EstimationReport, AppError> {
        let observations = Observations::collect(experiment, self.kinetics.output_names(), options)?;
        let settings = LmSettings::from(options);

        // Finite-difference Jacobians need integration noise well below the
        // perturbation size.
        let ode = OdeOptions {
            rtol: self.ode.rtol.min(1e-8),
            atol: self.ode.atol.min(1e-10),
            first_step: options.first_step,
            ..self.ode.clone()
        };

        let kinetics = &self.kinetics;
        let residuals = |params: &Parameters| -> Result<Vec<f64>, AppError> {
            let simulated = simulate_outputs(kinetics, params, &observations.times, &ode)?;
            Ok(observations.residuals(&simulated))
        };

        let mut params = self.params.clone();
        let report = levenberg_marquardt(&mut params, observations.len(), residuals, &settings)?;
        self.params = params;

        tracing::info!(
            model = self.kinetics.name(),
            experiment = %experiment.name,
            iterations = report.iterations,
            points = report.n_points,
            rmse = report.rmse,
            "parameter estimation finished"
        );
        Ok(report)
    }

    fn simulate(&self, experiment: &Experiment, t_grid: &[f64]) -> Result<Table, AppError> {
        let outputs = simulate_outputs(&self.kinetics, &self.params, t_grid, &self.ode)?;

        let columns = self.kinetics.output_names().iter().map(|s| s.to_string()).collect();
        let mut table = Table::new(columns);
        for (&t, row) in t_grid.iter().zip(outputs) {
            table.push_row(t, row.into_iter().map(Some).collect())?;
        }

        tracing::debug!(
            model = self.kinetics.name(),
            experiment = %experiment.name,
            points = table.len(),
            "simulation finished"
        );
        Ok(table)
    }
}

/// Integrate from t = 0 and evaluate the model outputs at each time of `t_eval`.
pub fn simulate_outputs<K: Kinetics>(
    kinetics: &K,
    params: &Parameters,
    t_eval: &[f64],
    ode: &OdeOptions,
) -> Result<Vec<Vec<f64>>, AppError> {
    let c = kinetics.coefficients(params)?;
    let x0 = kinetics.initial_state(&c);
    let states = integrate(|t, x, dx| kinetics.rhs(&c, t, x, dx), &x0, 0.0, t_eval, ode)?;

    let n_out = kinetics.output_names().len();
    Ok(states
        .iter()
        .map(|x| {
            let mut out = vec![0.0; n_out];
            kinetics.outputs(&c, x, &mut out);
            out
        })
        .collect())
}
