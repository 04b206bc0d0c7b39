//! Reporting utilities: per-variable fit statistics and formatted terminal output.

pub mod format;

pub use format::*;

use crate::domain::{Snapshot, Table};

/// How well the simulation matches one measured variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableFit {
    pub variable: String,
    /// Measured points inside the simulated time range.
    pub n: usize,
    pub rmse: f64,
    /// Mean of `measured - simulated`.
    pub bias: f64,
}

/// Compare every measured variable that the simulation also produces.
///
/// Simulated values are linearly interpolated at the measured times; points
/// outside the simulated horizon are ignored.
pub fn compute_fit_stats(snapshot: &Snapshot) -> Vec<VariableFit> {
    let Some(sim) = snapshot.simulated_data.table() else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for variable in &sim.columns {
        let Some(curve) = sim.series(variable) else {
            continue;
        };
        let measured: Vec<(f64, f64)> = snapshot
            .measured_data
            .values()
            .filter_map(|t: &Table| t.series(variable))
            .flatten()
            .collect();

        let diffs: Vec<f64> = measured
            .iter()
            .filter_map(|&(t, y)| interpolate(&curve, t).map(|s| y - s))
            .collect();
        if diffs.is_empty() {
            continue;
        }

        let n = diffs.len();
        let sse: f64 = diffs.iter().map(|d| d * d).sum();
        out.push(VariableFit {
            variable: variable.clone(),
            n,
            rmse: (sse / n as f64).sqrt(),
            bias: diffs.iter().sum::<f64>() / n as f64,
        });
    }
    out
}

/// Linear interpolation on a time-sorted series; `None` outside its range.
fn interpolate(curve: &[(f64, f64)], t: f64) -> Option<f64> {
    let (first, last) = (curve.first()?, curve.last()?);
    if t < first.0 || t > last.0 {
        return None;
    }
    let i = curve.partition_point(|&(x, _)| x < t);
    if i == 0 {
        return Some(first.1);
    }
    let (t0, y0) = curve[i - 1];
    let (t1, y1) = curve[i];
    if t1 == t0 {
        return Some(y1);
    }
    Some(y0 + (y1 - y0) * (t - t0) / (t1 - t0))
}
