//! Named model parameters with bounds and a vary flag.
//!
//! Estimation works in an unbounded internal space. For a parameter bounded by
//! `[min, max]` the mapping is
//!
//! ```text
//! internal = asin(2 (value - min) / (max - min) - 1)
//! value    = min + (sin(internal) + 1) (max - min) / 2
//! ```
//!
//! so any internal value maps back inside the bounds.

use serde::{Deserialize, Serialize};

use crate::domain::{ParamEntry, ParamMap, vary_label};
use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: f64,
    pub min: f64,
    pub max: f64,
    pub vary: bool,
}

impl Parameter {
    /// Create a parameter; the value is clipped into `[min, max]`.
    pub fn new(name: &str, value: f64, min: f64, max: f64, vary: bool) -> Result<Self, AppError> {
        validate_bounds(name, value, min, max)?;
        Ok(Self {
            name: name.to_string(),
            value: value.clamp(min, max),
            min,
            max,
            vary,
        })
    }

    pub fn to_internal(&self) -> f64 {
        let width = self.max - self.min;
        if width <= 0.0 {
            return 0.0;
        }
        let arg = (2.0 * (self.value - self.min) / width - 1.0).clamp(-1.0, 1.0);
        arg.asin()
    }

    pub fn from_internal(&self, internal: f64) -> f64 {
        let width = self.max - self.min;
        if width <= 0.0 {
            return self.min;
        }
        (self.min + (internal.sin() + 1.0) * width / 2.0).clamp(self.min, self.max)
    }

    pub fn entry(&self) -> ParamEntry {
        ParamEntry {
            name: self.name.clone(),
            value: self.value,
            vary: vary_label(self.vary).to_string(),
            min: self.min,
            max: self.max,
        }
    }
}

fn validate_bounds(name: &str, value: f64, min: f64, max: f64) -> Result<(), AppError> {
    if !value.is_finite() {
        return Err(AppError::config(format!(
            "Parameter `{name}` needs a finite value, got {value}."
        )));
    }
    if !(min.is_finite() && max.is_finite()) {
        return Err(AppError::config(format!(
            "Parameter `{name}` needs finite bounds, got [{min}, {max}]."
        )));
    }
    if min > max {
        return Err(AppError::config(format!(
            "Parameter `{name}` has min {min} greater than max {max}."
        )));
    }
    Ok(())
}

/// An ordered collection of parameters keyed by name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Parameters {
    items: Vec<Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value, min, max, vary)` rows, in row order.
    pub fn from_defaults(rows: &[(&str, f64, f64, f64, bool)]) -> Result<Self, AppError> {
        let mut params = Self::new();
        for &(name, value, min, max, vary) in rows {
            params.add(Parameter::new(name, value, min, max, vary)?)?;
        }
        Ok(params)
    }

    pub fn add(&mut self, param: Parameter) -> Result<(), AppError> {
        if self.get(&param.name).is_some() {
            return Err(AppError::config(format!("Duplicate parameter `{}`.", param.name)));
        }
        self.items.push(param);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.items.iter().find(|p| p.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Result<&mut Parameter, AppError> {
        self.items
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| AppError::config(format!("Unknown parameter `{name}`.")))
    }

    pub fn value(&self, name: &str) -> Result<f64, AppError> {
        self.get(name)
            .map(|p| p.value)
            .ok_or_else(|| AppError::config(format!("Unknown parameter `{name}`.")))
    }

    /// Replace every attribute of one parameter.
    pub fn set(&mut self, name: &str, vary: bool, value: f64, min: f64, max: f64) -> Result<(), AppError> {
        validate_bounds(name, value, min, max)?;
        let p = self.get_mut(name)?;
        p.vary = vary;
        p.min = min;
        p.max = max;
        p.value = value.clamp(min, max);
        Ok(())
    }

    /// Set a value, widening the bounds if the value lies outside them.
    pub fn seed_value(&mut self, name: &str, value: f64) -> Result<(), AppError> {
        if !value.is_finite() {
            return Err(AppError::data(format!(
                "Initial value for `{name}` must be finite, got {value}."
            )));
        }
        let p = self.get_mut(name)?;
        p.min = p.min.min(value);
        p.max = p.max.max(value);
        p.value = value;
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Positions of the parameters estimation may adjust.
    pub fn varying(&self) -> Vec<usize> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, p)| p.vary)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn internal_values(&self, idx: &[usize]) -> Vec<f64> {
        idx.iter().map(|&i| self.items[i].to_internal()).collect()
    }

    /// Map internal values back onto the parameters at `idx`.
    pub fn apply_internal(&mut self, idx: &[usize], internal: &[f64]) {
        for (&i, &u) in idx.iter().zip(internal) {
            let v = self.items[i].from_internal(u);
            self.items[i].value = v;
        }
    }

    /// Snapshot representation keyed by name, in declaration order.
    pub fn entries(&self) -> ParamMap {
        self.items.iter().map(Parameter::entry).collect()
    }
}
