//! Which variables a plot shows, and on which y axis.
//!
//! The preset's `VariableSelection` lists the variables on offer. A
//! `PlotSelection` records which of them are currently drawn as measured
//! points and as simulated curves, and which ones sit on the secondary axis
//! with its own linear/log scale.

use std::collections::BTreeSet;

use crate::domain::{AxisScale, Snapshot, VariableSelection};

/// What is drawn for one variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Shown {
    pub measured: bool,
    pub simulated: bool,
}

impl Shown {
    pub fn any(self) -> bool {
        self.measured || self.simulated
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotSelection {
    offered_measured: Vec<String>,
    offered_simulated: Vec<String>,
    measured: BTreeSet<String>,
    simulated: BTreeSet<String>,
    secondary: BTreeSet<String>,
    pub scale: AxisScale,
    pub secondary_scale: AxisScale,
}

impl PlotSelection {
    /// Every offered measured variable shown, no simulated curve, linear axes.
    pub fn new(offered: &VariableSelection) -> Self {
        Self {
            offered_measured: offered.measurement_vars.clone(),
            offered_simulated: offered.simulated_vars.clone(),
            measured: offered.measurement_vars.iter().cloned().collect(),
            simulated: BTreeSet::new(),
            secondary: BTreeSet::new(),
            scale: AxisScale::Linear,
            secondary_scale: AxisScale::Linear,
        }
    }

    /// Show exactly these variables; names that are not on offer are dropped.
    pub fn with_shown(mut self, measured: &[String], simulated: &[String]) -> Self {
        self.measured = measured
            .iter()
            .filter(|v| self.offered_measured.contains(v))
            .cloned()
            .collect();
        self.simulated = simulated
            .iter()
            .filter(|v| self.offered_simulated.contains(v))
            .cloned()
            .collect();
        self
    }

    /// Put these variables on the secondary axis.
    pub fn with_secondary(mut self, secondary: &[String], scale: AxisScale) -> Self {
        self.secondary = secondary
            .iter()
            .filter(|v| self.is_offered(v))
            .cloned()
            .collect();
        self.secondary_scale = scale;
        self
    }

    /// Offered variables: measured ones first, then simulated-only outputs.
    pub fn variables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.offered_measured.iter().map(String::as_str).collect();
        for var in &self.offered_simulated {
            if !out.contains(&var.as_str()) {
                out.push(var);
            }
        }
        out
    }

    /// Variables with at least one visible series, in `variables()` order.
    pub fn panels(&self) -> Vec<&str> {
        self.variables()
            .into_iter()
            .filter(|v| self.shown(v).any())
            .collect()
    }

    pub fn shown(&self, variable: &str) -> Shown {
        Shown {
            measured: self.measured.contains(variable),
            simulated: self.simulated.contains(variable),
        }
    }

    pub fn offers_measured(&self, variable: &str) -> bool {
        self.offered_measured.iter().any(|v| v == variable)
    }

    pub fn offers_simulated(&self, variable: &str) -> bool {
        self.offered_simulated.iter().any(|v| v == variable)
    }

    fn is_offered(&self, variable: &str) -> bool {
        self.offers_measured(variable) || self.offers_simulated(variable)
    }

    pub fn is_secondary(&self, variable: &str) -> bool {
        self.secondary.contains(variable)
    }

    /// The y scale a variable is drawn with.
    pub fn scale_for(&self, variable: &str) -> AxisScale {
        if self.is_secondary(variable) {
            self.secondary_scale
        } else {
            self.scale
        }
    }

    /// Flip the measured series of `variable`; returns whether it is now shown.
    pub fn toggle_measured(&mut self, variable: &str) -> bool {
        self.offers_measured(variable) && toggle(&mut self.measured, variable)
    }

    /// Flip the simulated curve of `variable`; returns whether it is now shown.
    pub fn toggle_simulated(&mut self, variable: &str) -> bool {
        self.offers_simulated(variable) && toggle(&mut self.simulated, variable)
    }

    /// Move `variable` between the axes; returns whether it is now secondary.
    pub fn toggle_secondary(&mut self, variable: &str) -> bool {
        self.is_offered(variable) && toggle(&mut self.secondary, variable)
    }

    pub fn toggle_scale(&mut self) {
        self.scale = flip(self.scale);
    }

    pub fn toggle_secondary_scale(&mut self) {
        self.secondary_scale = flip(self.secondary_scale);
    }
}

fn toggle(set: &mut BTreeSet<String>, variable: &str) -> bool {
    if set.remove(variable) {
        false
    } else {
        set.insert(variable.to_string());
        true
    }
}

fn flip(scale: AxisScale) -> AxisScale {
    match scale {
        AxisScale::Linear => AxisScale::Log,
        AxisScale::Log => AxisScale::Linear,
    }
}

/// Map a value onto the y axis; `None` when it cannot be drawn.
pub fn to_axis(y: f64, scale: AxisScale) -> Option<f64> {
    match scale {
        AxisScale::Linear => y.is_finite().then_some(y),
        AxisScale::Log => (y.is_finite() && y > 0.0).then(|| y.log10()),
    }
}

/// Measured points and simulated curve of one variable, already on the axis.
pub fn variable_series(
    snapshot: &Snapshot,
    variable: &str,
    shown: Shown,
    scale: AxisScale,
) -> (Vec<(f64, f64)>, Vec<(f64, f64)>) {
    let measured = if shown.measured {
        snapshot
            .measured_data
            .values()
            .filter_map(|t| t.series(variable))
            .flatten()
            .filter_map(|(t, y)| to_axis(y, scale).map(|y| (t, y)))
            .collect()
    } else {
        Vec::new()
    };
    let simulated = if shown.simulated {
        snapshot
            .simulated_data
            .table()
            .and_then(|t| t.series(variable))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(t, y)| to_axis(y, scale).map(|y| (t, y)))
            .collect()
    } else {
        Vec::new()
    };
    (measured, simulated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offered() -> VariableSelection {
        VariableSelection {
            measurement_vars: vec!["cX".to_string(), "CO2".to_string()],
            simulated_vars: vec!["cX".to_string(), "CO2".to_string(), "mu".to_string()],
        }
    }

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn starts_with_measured_only() {
        let sel = PlotSelection::new(&offered());
        assert_eq!(sel.variables(), vec!["cX", "CO2", "mu"]);
        assert_eq!(sel.panels(), vec!["cX", "CO2"]);
        assert_eq!(
            sel.shown("cX"),
            Shown {
                measured: true,
                simulated: false
            }
        );
        assert!(!sel.shown("mu").any());
    }

    #[test]
    fn simulated_only_output_gets_a_panel() {
        let mut sel = PlotSelection::new(&offered());
        assert!(sel.toggle_simulated("mu"));
        assert_eq!(sel.panels(), vec!["cX", "CO2", "mu"]);

        // `mu` is never measured, so there is nothing to toggle.
        assert!(!sel.toggle_measured("mu"));
        assert!(!sel.toggle_measured("cX"));
        assert!(!sel.shown("cX").any());
        assert_eq!(sel.panels(), vec!["CO2", "mu"]);
    }

    #[test]
    fn secondary_axis_has_its_own_scale() {
        let mut sel = PlotSelection::new(&offered()).with_secondary(&names(&["CO2", "pH"]), AxisScale::Log);
        assert!(sel.is_secondary("CO2"));
        assert!(!sel.is_secondary("pH"));
        assert_eq!(sel.scale_for("CO2"), AxisScale::Log);
        assert_eq!(sel.scale_for("cX"), AxisScale::Linear);

        sel.toggle_scale();
        sel.toggle_secondary_scale();
        assert_eq!(sel.scale_for("cX"), AxisScale::Log);
        assert_eq!(sel.scale_for("CO2"), AxisScale::Linear);

        assert!(!sel.toggle_secondary("CO2"));
        assert_eq!(sel.scale_for("CO2"), AxisScale::Log);
    }

    #[test]
    fn explicit_lists_drop_unknown_names() {
        let sel = PlotSelection::new(&offered()).with_shown(&names(&["CO2", "cS"]), &names(&["mu"]));
        assert_eq!(sel.panels(), vec!["CO2", "mu"]);
        assert!(!sel.shown("cS").any());
    }
}
