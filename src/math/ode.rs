//! Adaptive explicit Runge–Kutta integration (Dormand–Prince 5(4)).
//!
//! The integrator advances from `t0` through a sorted list of output times and
//! returns the state at each of them. Steps are clipped so that every output
//! time is hit exactly; no dense-output interpolation is needed.
//!
//! Error control uses the usual mixed tolerance
//! `scale_i = atol + rtol * max(|x_i|, |x_new_i|)` and an RMS norm.

use crate::error::AppError;

const C2: f64 = 1.0 / 5.0;
const C3: f64 = 3.0 / 10.0;
const C4: f64 = 4.0 / 5.0;
const C5: f64 = 8.0 / 9.0;

const A21: f64 = 1.0 / 5.0;
const A31: f64 = 3.0 / 40.0;
const A32: f64 = 9.0 / 40.0;
const A41: f64 = 44.0 / 45.0;
const A42: f64 = -56.0 / 15.0;
const A43: f64 = 32.0 / 9.0;
const A51: f64 = 19372.0 / 6561.0;
const A52: f64 = -25360.0 / 2187.0;
const A53: f64 = 64448.0 / 6561.0;
const A54: f64 = -212.0 / 729.0;
const A61: f64 = 9017.0 / 3168.0;
const A62: f64 = -355.0 / 33.0;
const A63: f64 = 46732.0 / 5247.0;
const A64: f64 = 49.0 / 176.0;
const A65: f64 = -5103.0 / 18656.0;

// 5th-order weights (also the last stage row, FSAL).
const B1: f64 = 35.0 / 384.0;
const B3: f64 = 500.0 / 1113.0;
const B4: f64 = 125.0 / 192.0;
const B5: f64 = -2187.0 / 6784.0;
const B6: f64 = 11.0 / 84.0;

// Difference between 5th- and 4th-order weights.
const E1: f64 = 71.0 / 57600.0;
const E3: f64 = -71.0 / 16695.0;
const E4: f64 = 71.0 / 1920.0;
const E5: f64 = -17253.0 / 339200.0;
const E6: f64 = 22.0 / 525.0;
const E7: f64 = -1.0 / 40.0;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Raised when the requested first step is longer than the integration span.
pub const FIRST_STEP_EXCEEDS_BOUNDS: &str = "`first_step` exceeds bounds.";

/// Integrator settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OdeOptions {
    pub rtol: f64,
    pub atol: f64,
    /// Initial step; when `None` a step is chosen from the initial derivative.
    pub first_step: Option<f64>,
    pub max_step: f64,
    pub max_steps: usize,
}

impl Default for OdeOptions {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-8,
            first_step: None,
            max_step: f64::INFINITY,
            max_steps: 200_000,
        }
    }
}

/// Integrate `dx/dt = rhs(t, x)` from `(t0, x0)` and report the state at each
/// time of `t_eval` (ascending, all `>= t0`).
pub fn integrate<F>(
    mut rhs: F,
    x0: &[f64],
    t0: f64,
    t_eval: &[f64],
    opts: &OdeOptions,
) -> Result<Vec<Vec<f64>>, AppError>
where
    F: FnMut(f64, &[f64], &mut [f64]),
{
    let t_end = t_eval.last().copied().unwrap_or(t0);
    let span = t_end - t0;

    if let Some(h) = opts.first_step {
        if !(h.is_finite() && h > 0.0) {
            return Err(AppError::runtime("`first_step` must be positive."));
        }
        if h > span.abs() {
            return Err(AppError::runtime(FIRST_STEP_EXCEEDS_BOUNDS));
        }
    }
    if t_eval.is_empty() {
        return Ok(Vec::new());
    }
    if t_eval.iter().any(|t| !t.is_finite()) {
        return Err(AppError::runtime("Integration times must be finite."));
    }
    if t_eval[0] < t0 || t_eval.windows(2).any(|w| w[1] < w[0]) {
        return Err(AppError::runtime(
            "Integration times must be ascending and start at or after t0.",
        ));
    }

    let n = x0.len();
    let mut out = Vec::with_capacity(t_eval.len());
    let mut t = t0;
    let mut x = x0.to_vec();

    let mut k1 = vec![0.0; n];
    let mut k2 = vec![0.0; n];
    let mut k3 = vec![0.0; n];
    let mut k4 = vec![0.0; n];
    let mut k5 = vec![0.0; n];
    let mut k6 = vec![0.0; n];
    let mut k7 = vec![0.0; n];
    let mut tmp = vec![0.0; n];
    let mut x_new = vec![0.0; n];

    rhs(t, &x, &mut k1);
    let mut h = match opts.first_step {
        Some(h) => h,
        None => initial_step(&x, &k1, span, opts),
    };
    h = h.min(opts.max_step);

    let mut steps = 0usize;
    for &target in t_eval {
        while t < target {
            steps += 1;
            if steps > opts.max_steps {
                return Err(AppError::runtime(format!(
                    "Integration exceeded {} steps before t={target:.4}.",
                    opts.max_steps
                )));
            }
            let min_step = 1e-12 * t.abs().max(1.0);
            if h < min_step {
                return Err(AppError::runtime(format!(
                    "Integration step size became too small at t={t:.6}."
                )));
            }

            let remaining = target - t;
            let clipped = h >= remaining;
            let dt = if clipped { remaining } else { h };

            for i in 0..n {
                tmp[i] = x[i] + dt * A21 * k1[i];
            }
            rhs(t + C2 * dt, &tmp, &mut k2);
            for i in 0..n {
                tmp[i] = x[i] + dt * (A31 * k1[i] + A32 * k2[i]);
            }
            rhs(t + C3 * dt, &tmp, &mut k3);
            for i in 0..n {
                tmp[i] = x[i] + dt * (A41 * k1[i] + A42 * k2[i] + A43 * k3[i]);
            }
            rhs(t + C4 * dt, &tmp, &mut k4);
            for i in 0..n {
                tmp[i] = x[i] + dt * (A51 * k1[i] + A52 * k2[i] + A53 * k3[i] + A54 * k4[i]);
            }
            rhs(t + C5 * dt, &tmp, &mut k5);
            for i in 0..n {
                tmp[i] = x[i]
                    + dt * (A61 * k1[i] + A62 * k2[i] + A63 * k3[i] + A64 * k4[i] + A65 * k5[i]);
            }
            rhs(t + dt, &tmp, &mut k6);
            for i in 0..n {
                x_new[i] = x[i]
                    + dt * (B1 * k1[i] + B3 * k3[i] + B4 * k4[i] + B5 * k5[i] + B6 * k6[i]);
            }
            rhs(t + dt, &x_new, &mut k7);

            let mut acc = 0.0;
            for i in 0..n {
                let e = dt
                    * (E1 * k1[i] + E3 * k3[i] + E4 * k4[i] + E5 * k5[i] + E6 * k6[i] + E7 * k7[i]);
                let scale = opts.atol + opts.rtol * x[i].abs().max(x_new[i].abs());
                acc += (e / scale).powi(2);
            }
            let err = if n == 0 { 0.0 } else { (acc / n as f64).sqrt() };

            if !err.is_finite() {
                h = dt * MIN_FACTOR;
                continue;
            }

            if err <= 1.0 {
                t = if clipped { target } else { t + dt };
                x.copy_from_slice(&x_new);
                k1.copy_from_slice(&k7);
                if x.iter().any(|v| !v.is_finite()) {
                    return Err(AppError::runtime(format!(
                        "Integration produced a non-finite state at t={t:.6}."
                    )));
                }
                let factor = if err == 0.0 {
                    MAX_FACTOR
                } else {
                    (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, MAX_FACTOR)
                };
                // A step shortened to land on an output time says nothing about
                // the achievable step size, so keep the previous proposal.
                if !clipped {
                    h = (dt * factor).min(opts.max_step);
                }
            } else {
                let factor = (SAFETY * err.powf(-0.2)).clamp(MIN_FACTOR, 1.0);
                h = dt * factor;
            }
        }
        out.push(x.clone());
    }

    Ok(out)
}

fn initial_step(x0: &[f64], f0: &[f64], span: f64, opts: &OdeOptions) -> f64 {
    if span <= 0.0 {
        return opts.max_step.min(1.0);
    }
    let n = x0.len().max(1) as f64;
    let mut d0 = 0.0;
    let mut d1 = 0.0;
    for (x, f) in x0.iter().zip(f0) {
        let scale = opts.atol + opts.rtol * x.abs();
        d0 += (x / scale).powi(2);
        d1 += (f / scale).powi(2);
    }
    let d0 = (d0 / n).sqrt();
    let d1 = (d1 / n).sqrt();
    let h = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
    h.min(span).min(opts.max_step)
}
