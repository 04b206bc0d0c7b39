//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - produced by the loader and the simulator
//! - shipped to the presentation layer inside a snapshot
//! - written to JSON/CSV and reloaded later

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A time-indexed table in "split" layout.
///
/// `index` holds process time in hours; `data[i][j]` is the value of
/// `columns[j]` at `index[i]` (`None` when the cell was empty).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub index: Vec<f64>,
    pub data: Vec<Vec<Option<f64>>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            index: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn push_row(&mut self, t: f64, row: Vec<Option<f64>>) -> Result<(), AppError> {
        if row.len() != self.columns.len() {
            return Err(AppError::runtime(format!(
                "Row width {} does not match table width {}.",
                row.len(),
                self.columns.len()
            )));
        }
        self.index.push(t);
        self.data.push(row);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Non-missing `(t, value)` pairs of one column.
    pub fn series(&self, name: &str) -> Option<Vec<(f64, f64)>> {
        let j = self.column_index(name)?;
        Some(
            self.index
                .iter()
                .zip(&self.data)
                .filter_map(|(&t, row)| row[j].map(|v| (t, v)))
                .collect(),
        )
    }

    /// Number of non-missing cells in one column (0 if the column is absent).
    pub fn count(&self, name: &str) -> usize {
        match self.column_index(name) {
            Some(j) => self.data.iter().filter(|row| row[j].is_some()).count(),
            None => 0,
        }
    }

    /// Last time point, if any.
    pub fn t_max(&self) -> Option<f64> {
        self.index.iter().copied().fold(None, |acc, t| match acc {
            Some(m) if m >= t => Some(m),
            _ => Some(t),
        })
    }
}

/// One row of the editable parameter table.
///
/// `vary` is kept as text because it is a table cell; it only becomes a
/// boolean when the row is replayed into a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRow {
    pub name: String,
    pub value: f64,
    pub vary: String,
    pub min: f64,
    pub max: f64,
}

/// The vary cell after coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaryFlag {
    Bool(bool),
    /// Text that is not one of the recognised spellings, passed on untouched.
    Raw(String),
}

impl VaryFlag {
    /// Coerce a table cell: `True`/`true` and `False`/`false` become booleans,
    /// anything else is passed through unchanged.
    pub fn coerce(cell: &str) -> Self {
        match cell {
            "True" | "true" => VaryFlag::Bool(true),
            "False" | "false" => VaryFlag::Bool(false),
            other => VaryFlag::Raw(other.to_string()),
        }
    }
}

/// Wire spelling of a vary flag (`"True"` / `"False"`).
pub fn vary_label(vary: bool) -> &'static str {
    if vary { "True" } else { "False" }
}

/// Whether timer ticks run parameter estimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AutoEstimation {
    Enabled,
    Disabled,
}

impl AutoEstimation {
    pub fn is_enabled(self) -> bool {
        self == AutoEstimation::Enabled
    }

    pub fn toggled(self) -> Self {
        match self {
            AutoEstimation::Enabled => AutoEstimation::Disabled,
            AutoEstimation::Disabled => AutoEstimation::Enabled,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AutoEstimation::Enabled => "enabled",
            AutoEstimation::Disabled => "disabled",
        }
    }
}

/// Y-axis scaling for charts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AxisScale {
    Linear,
    Log,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vary_coercion_recognises_four_spellings_only() {
        assert_eq!(VaryFlag::coerce("True"), VaryFlag::Bool(true));
        assert_eq!(VaryFlag::coerce("true"), VaryFlag::Bool(true));
        assert_eq!(VaryFlag::coerce("False"), VaryFlag::Bool(false));
        assert_eq!(VaryFlag::coerce("false"), VaryFlag::Bool(false));
        assert_eq!(VaryFlag::coerce("TRUE"), VaryFlag::Raw("TRUE".to_string()));
        assert_eq!(VaryFlag::coerce("yes"), VaryFlag::Raw("yes".to_string()));
        assert_eq!(VaryFlag::coerce(""), VaryFlag::Raw(String::new()));
    }

    #[test]
    fn series_skips_missing_cells() {
        let mut table = Table::new(vec!["a".to_string(), "b".to_string()]);
        table.push_row(0.0, vec![Some(1.0), None]).unwrap();
        table.push_row(0.5, vec![None, Some(2.0)]).unwrap();
        table.push_row(1.0, vec![Some(3.0), Some(4.0)]).unwrap();

        assert_eq!(table.series("a").unwrap(), vec![(0.0, 1.0), (1.0, 3.0)]);
        assert_eq!(table.count("b"), 2);
        assert_eq!(table.count("missing"), 0);
        assert_eq!(table.t_max(), Some(1.0));
        assert!(table.push_row(2.0, vec![Some(1.0)]).is_err());
    }
}
