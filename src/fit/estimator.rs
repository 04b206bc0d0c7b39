//! Bounded Levenberg–Marquardt estimation.
//!
//! Given:
//! - a parameter set with some vary-enabled entries
//! - a residual function `r(p)` (weighted simulated-minus-measured values)
//!
//! we minimise `‖r(p)‖²` over the vary-enabled parameters in the unbounded
//! internal space of `Parameters` (so every trial point respects the bounds).
//!
//! Each iteration:
//! - builds a forward-difference Jacobian, one column per varying parameter,
//!   evaluated in parallel
//! - solves the damped step with SVD (`math::solve_damped_step`)
//! - accepts the step if it lowers the cost (and relaxes the damping), or
//!   raises the damping and retries

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::Serialize;

use crate::domain::EstimateOptions;
use crate::error::AppError;
use crate::math::solve_damped_step;
use crate::models::Parameters;

/// Raised when fewer observations than vary-enabled parameters are available.
pub const TOO_FEW_POINTS: &str = "The length of the data points in the measurement data is smaller than the number of the fit parameters with vary == True";

const LAMBDA_START: f64 = 1e-3;
const LAMBDA_MAX: f64 = 1e12;
const MAX_TRIALS: usize = 10;
/// Relative forward-difference step in internal space.
const FD_STEP: f64 = 1e-4;

/// Stopping rules for the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LmSettings {
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
}

impl From<&EstimateOptions> for LmSettings {
    fn from(options: &EstimateOptions) -> Self {
        Self {
            max_iterations: options.max_iterations,
            ftol: options.ftol,
            xtol: options.xtol,
        }
    }
}

/// Summary of one estimation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationReport {
    pub iterations: usize,
    pub evaluations: usize,
    pub n_points: usize,
    pub n_varying: usize,
    /// Final sum of squared residuals.
    pub cost: f64,
    pub rmse: f64,
    pub converged: bool,
}

/// Fit the vary-enabled entries of `params` in place.
///
/// `n_points` is the number of residuals `residuals` returns. A failing
/// residual evaluation at the starting point is returned as the error; during
/// the search it just rejects the trial step.
pub fn levenberg_marquardt<F>(
    params: &mut Parameters,
    n_points: usize,
    residuals: F,
    settings: &LmSettings,
) -> Result<EstimationReport, AppError>
where
    F: Fn(&Parameters) -> Result<Vec<f64>, AppError> + Sync,
{
    let idx = params.varying();
    let n = idx.len();
    if n_points < n {
        return Err(AppError::runtime(TOO_FEW_POINTS));
    }

    let mut evaluations = 1;
    let mut r = checked(residuals(params)?, n_points)?;
    let mut cost = sum_sq(&r);

    let mut report = EstimationReport {
        iterations: 0,
        evaluations,
        n_points,
        n_varying: n,
        cost,
        rmse: rmse(cost, n_points),
        converged: n == 0 || cost == 0.0,
    };
    if report.converged {
        return Ok(report);
    }

    let mut u = params.internal_values(&idx);
    let mut lambda = LAMBDA_START;

    'outer: for iteration in 1..=settings.max_iterations {
        report.iterations = iteration;

        let jacobian = jacobian(params, &idx, &u, &r, &residuals)?;
        evaluations += n;

        let scale: Vec<f64> = (0..n).map(|j| jacobian.column(j).norm()).collect();
        let r_vec = DVector::from_column_slice(&r);

        let mut accepted = false;
        for _ in 0..MAX_TRIALS {
            let Some(step) = solve_damped_step(&jacobian, &r_vec, lambda, &scale) else {
                lambda *= 10.0;
                if lambda > LAMBDA_MAX {
                    break 'outer;
                }
                continue;
            };

            let u_trial: Vec<f64> = u.iter().zip(step.iter()).map(|(a, b)| a + b).collect();
            let mut trial = params.clone();
            trial.apply_internal(&idx, &u_trial);
            evaluations += 1;

            let trial_cost = match residuals(&trial).and_then(|r| checked(r, n_points)) {
                Ok(r_trial) => {
                    let c = sum_sq(&r_trial);
                    if c < cost {
                        Some((r_trial, c))
                    } else {
                        None
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "trial step failed to evaluate");
                    None
                }
            };

            match trial_cost {
                Some((r_trial, c)) => {
                    let reduction = (cost - c) / cost;
                    let step_norm = step.norm();
                    let u_norm = u.iter().map(|v| v * v).sum::<f64>().sqrt();

                    *params = trial;
                    u = u_trial;
                    r = r_trial;
                    cost = c;
                    lambda = (lambda / 10.0).max(1e-12);
                    accepted = true;

                    if reduction < settings.ftol || step_norm < settings.xtol * (u_norm + settings.xtol) {
                        report.converged = true;
                    }
                    break;
                }
                None => {
                    lambda *= 10.0;
                    if lambda > LAMBDA_MAX {
                        break;
                    }
                }
            }
        }

        tracing::trace!(iteration, cost, lambda, accepted, "lm iteration");

        if report.converged {
            break;
        }
        if !accepted {
            // No downhill step at any damping: we are at a (local) minimum.
            report.converged = true;
            break;
        }
    }

    report.evaluations = evaluations;
    report.cost = cost;
    report.rmse = rmse(cost, n_points);
    Ok(report)
}

fn jacobian<F>(
    params: &Parameters,
    idx: &[usize],
    u: &[f64],
    r0: &[f64],
    residuals: &F,
) -> Result<DMatrix<f64>, AppError>
where
    F: Fn(&Parameters) -> Result<Vec<f64>, AppError> + Sync,
{
    let m = r0.len();
    let columns: Vec<Vec<f64>> = (0..idx.len())
        .into_par_iter()
        .map(|j| -> Result<Vec<f64>, AppError> {
            let h = FD_STEP * u[j].abs().max(1.0);
            let mut u_h = u.to_vec();
            u_h[j] += h;
            let mut trial = params.clone();
            trial.apply_internal(idx, &u_h);
            let r_h = checked(residuals(&trial)?, m)?;
            Ok(r_h.iter().zip(r0).map(|(a, b)| (a - b) / h).collect())
        })
        .collect::<Result<_, AppError>>()?;

    Ok(DMatrix::from_fn(m, idx.len(), |i, j| columns[j][i]))
}

fn checked(r: Vec<f64>, n_points: usize) -> Result<Vec<f64>, AppError> {
    if r.len() != n_points {
        return Err(AppError::runtime(format!(
            "Residual function returned {} values, expected {n_points}.",
            r.len()
        )));
    }
    if r.iter().any(|v| !v.is_finite()) {
        return Err(AppError::runtime("Residuals contain non-finite values."));
    }
    Ok(r)
}

fn sum_sq(r: &[f64]) -> f64 {
    r.iter().map(|v| v * v).sum()
}

fn rmse(cost: f64, n_points: usize) -> f64 {
    if n_points == 0 {
        0.0
    } else {
        (cost / n_points as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Parameter;

    fn settings() -> LmSettings {
        LmSettings::from(&EstimateOptions::default())
    }

    fn exponential_data() -> Vec<(f64, f64)> {
        (0..12)
            .map(|i| {
                let t = i as f64 * 0.5;
                (t, 2.0 * (-0.7 * t).exp())
            })
            .collect()
    }

    #[test]
    fn recovers_exponential_decay() {
        let data = exponential_data();
        let mut params = Parameters::new();
        params.add(Parameter::new("a", 1.0, 0.0, 10.0, true).unwrap()).unwrap();
        params.add(Parameter::new("k", 0.2, 0.0, 5.0, true).unwrap()).unwrap();

        let residuals = |p: &Parameters| -> Result<Vec<f64>, AppError> {
            let a = p.value("a")?;
            let k = p.value("k")?;
            Ok(data.iter().map(|(t, y)| a * (-k * t).exp() - y).collect())
        };

        let report = levenberg_marquardt(&mut params, data.len(), residuals, &settings()).unwrap();
        assert!(report.converged);
        assert!((params.value("a").unwrap() - 2.0).abs() < 1e-4);
        assert!((params.value("k").unwrap() - 0.7).abs() < 1e-4);
        assert!(report.rmse < 1e-5);
    }

    #[test]
    fn fixed_parameters_stay_put_and_bounds_hold() {
        let data = exponential_data();
        let mut params = Parameters::new();
        params.add(Parameter::new("a", 1.0, 0.0, 10.0, false).unwrap()).unwrap();
        params.add(Parameter::new("k", 0.2, 0.0, 0.5, true).unwrap()).unwrap();

        let residuals = |p: &Parameters| -> Result<Vec<f64>, AppError> {
            let a = p.value("a")?;
            let k = p.value("k")?;
            Ok(data.iter().map(|(t, y)| a * (-k * t).exp() - y).collect())
        };

        levenberg_marquardt(&mut params, data.len(), residuals, &settings()).unwrap();
        assert_eq!(params.value("a").unwrap(), 1.0);
        let k = params.value("k").unwrap();
        assert!((0.0..=0.5).contains(&k));
    }

    #[test]
    fn too_few_points_has_exact_message() {
        let mut params = Parameters::new();
        params.add(Parameter::new("a", 1.0, 0.0, 2.0, true).unwrap()).unwrap();
        params.add(Parameter::new("b", 1.0, 0.0, 2.0, true).unwrap()).unwrap();

        let err = levenberg_marquardt(&mut params, 1, |_: &Parameters| Ok(vec![0.5]), &settings())
            .unwrap_err();
        assert_eq!(err.message(), TOO_FEW_POINTS);
    }

    #[test]
    fn failing_start_point_is_reported() {
        let mut params = Parameters::new();
        params.add(Parameter::new("a", 1.0, 0.0, 2.0, true).unwrap()).unwrap();
        let err = levenberg_marquardt(
            &mut params,
            3,
            |_: &Parameters| Err(AppError::runtime("`first_step` exceeds bounds.")),
            &settings(),
        )
        .unwrap_err();
        assert_eq!(err.message(), "`first_step` exceeds bounds.");
    }
}
