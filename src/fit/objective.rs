//! Observation layout shared by every residual evaluation.
//!
//! The model is integrated once per evaluation over the sorted, de-duplicated
//! set of measurement times; each observation then points at one
//! `(time, output)` cell of that simulation.

use crate::domain::EstimateOptions;
use crate::error::AppError;
use crate::io::Experiment;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ObsPoint {
    time_idx: usize,
    output_idx: usize,
    value: f64,
    weight: f64,
}

/// Measured points of the fitted variables, aligned to a common time grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Observations {
    /// Sorted unique measurement times (hours).
    pub times: Vec<f64>,
    points: Vec<ObsPoint>,
}

impl Observations {
    /// Collect the observations of `options.fit_variables` from `experiment`.
    ///
    /// Every fitted variable must be one of `outputs`; variables without any
    /// measurement contribute nothing. Negative times are dropped.
    pub fn collect(
        experiment: &Experiment,
        outputs: &[&str],
        options: &EstimateOptions,
    ) -> Result<Self, AppError> {
        let mut raw = Vec::new();
        for var in &options.fit_variables {
            let output_idx = outputs.iter().position(|o| o == var).ok_or_else(|| {
                AppError::config(format!(
                    "Fit variable `{var}` is not an output of the model (outputs: {}).",
                    outputs.join(", ")
                ))
            })?;
            let weight = options.weight(var);
            if !(weight.is_finite() && weight >= 0.0) {
                return Err(AppError::config(format!(
                    "Weight for `{var}` must be finite and non-negative, got {weight}."
                )));
            }
            raw.extend(
                experiment
                    .observations(var)
                    .into_iter()
                    .filter(|(t, _)| *t >= 0.0)
                    .map(|(t, v)| (t, output_idx, v, weight)),
            );
        }

        let mut times: Vec<f64> = raw.iter().map(|p| p.0).collect();
        times.sort_by(f64::total_cmp);
        times.dedup();

        let points = raw
            .into_iter()
            .map(|(t, output_idx, value, weight)| ObsPoint {
                time_idx: times.partition_point(|&x| x < t),
                output_idx,
                value,
                weight,
            })
            .collect();

        Ok(Self { times, points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Weighted residuals `w · (simulated - measured)`.
    ///
    /// `simulated[i][k]` is output `k` at `self.times[i]`.
    pub fn residuals(&self, simulated: &[Vec<f64>]) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| {
                let sim = simulated
                    .get(p.time_idx)
                    .and_then(|row| row.get(p.output_idx))
                    .copied()
                    .unwrap_or(f64::NAN);
                p.weight * (sim - p.value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Table;
    use crate::io::Metadata;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn experiment() -> Experiment {
        let mut offline = Table::new(vec!["cX".to_string(), "cS".to_string()]);
        offline.push_row(0.0, vec![Some(0.1), Some(20.0)]).unwrap();
        offline.push_row(2.0, vec![None, Some(18.0)]).unwrap();
        let mut offgas = Table::new(vec!["CO2".to_string()]);
        offgas.push_row(1.0, vec![Some(0.3)]).unwrap();
        offgas.push_row(2.0, vec![Some(0.5)]).unwrap();

        let mut dataset = BTreeMap::new();
        dataset.insert("offline".to_string(), offline);
        dataset.insert("offgas".to_string(), offgas);
        Experiment {
            name: "test".to_string(),
            start: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
            dataset,
            metadata: Metadata::default(),
            skipped_rows: 0,
        }
    }

    #[test]
    fn shares_one_time_grid_across_types() {
        let options = EstimateOptions::default();
        let obs = Observations::collect(&experiment(), &["cX", "cS", "cE", "CO2"], &options).unwrap();
        assert_eq!(obs.times, vec![0.0, 1.0, 2.0]);
        assert_eq!(obs.len(), 5);

        // simulated[i] = [cX, cS, cE, CO2] at times[i]
        let sim = vec![
            vec![0.2, 20.0, 0.0, 0.0],
            vec![0.3, 19.0, 0.0, 0.4],
            vec![0.4, 17.0, 0.0, 0.5],
        ];
        let mut r = obs.residuals(&sim);
        r.sort_by(f64::total_cmp);
        let expected = [-1.0, 0.0, 0.0, 0.1, 0.1];
        for (a, b) in r.iter().zip(expected) {
            assert!((a - b).abs() < 1e-12, "{r:?}");
        }
    }

    #[test]
    fn weights_scale_residuals() {
        let mut options = EstimateOptions::default();
        options.fit_variables = vec!["CO2".to_string()];
        options.weights.insert("CO2".to_string(), 10.0);
        let obs = Observations::collect(&experiment(), &["CO2"], &options).unwrap();
        let r = obs.residuals(&[vec![0.4], vec![0.5]]);
        assert!((r[0] - 1.0).abs() < 1e-12);
        assert!(r[1].abs() < 1e-12);
    }

    #[test]
    fn unknown_fit_variable_is_rejected() {
        let mut options = EstimateOptions::default();
        options.fit_variables = vec!["pH".to_string()];
        let err = Observations::collect(&experiment(), &["cX"], &options).unwrap_err();
        assert!(err.message().contains("pH"));
    }
}
