//! Least-squares solves used by the Levenberg–Marquardt estimator.
//!
//! Each LM iteration needs the step `δ` minimizing
//!
//! ```text
//! ‖J δ + r‖² + λ ‖D δ‖²
//! ```
//!
//! which is an ordinary least-squares problem on the stacked system
//! `[J; √λ D] δ = [-r; 0]`. We solve it with SVD so that rank-deficient
//! Jacobians (parameters the data cannot identify) still yield a usable step.
//! (Nalgebra's `QR::solve` is intended for square systems and will panic for
//! non-square matrices.)

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve the damped Gauss–Newton step `[J; √λ D] δ = [-r; 0]`.
///
/// `scale` holds the diagonal of `D` (typically `sqrt(diag(JᵀJ))`); zero
/// entries are replaced by one so that unidentifiable parameters stay put.
pub fn solve_damped_step(
    jacobian: &DMatrix<f64>,
    residuals: &DVector<f64>,
    lambda: f64,
    scale: &[f64],
) -> Option<DVector<f64>> {
    let m = jacobian.nrows();
    let n = jacobian.ncols();
    if scale.len() != n || residuals.len() != m {
        return None;
    }

    let mut a = DMatrix::<f64>::zeros(m + n, n);
    a.view_mut((0, 0), (m, n)).copy_from(jacobian);
    let damping = lambda.max(0.0).sqrt();
    for (j, &s) in scale.iter().enumerate() {
        let d = if s > 0.0 && s.is_finite() { s } else { 1.0 };
        a[(m + j, j)] = damping * d;
    }

    let mut b = DVector::<f64>::zeros(m + n);
    for i in 0..m {
        b[i] = -residuals[i];
    }

    solve_least_squares(&a, &b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn undamped_step_is_the_gauss_newton_step() {
        // r(p) = J p - y with J = I: the full step from p = 0 is y.
        let j = DMatrix::<f64>::identity(2, 2);
        let r = DVector::from_row_slice(&[-1.0, 2.0]);
        let step = solve_damped_step(&j, &r, 0.0, &[1.0, 1.0]).unwrap();
        assert!((step[0] - 1.0).abs() < 1e-12);
        assert!((step[1] + 2.0).abs() < 1e-12);
    }

    #[test]
    fn damping_shortens_the_step() {
        let j = DMatrix::<f64>::identity(1, 1);
        let r = DVector::from_row_slice(&[-1.0]);
        let step = solve_damped_step(&j, &r, 1.0, &[1.0]).unwrap();
        // (1 + λ) δ = 1  ->  δ = 0.5
        assert!((step[0] - 0.5).abs() < 1e-12);
    }
}
