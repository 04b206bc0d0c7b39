//! Overflow metabolism of *Saccharomyces cerevisiae* on glucose.
//!
//! States: biomass `cX`, glucose `cS`, ethanol `cE` (g/L). Glucose uptake
//! follows Monod kinetics; uptake beyond the respiratory capacity `qsox_max`
//! is fermented to ethanol, and spare respiratory capacity is used to consume
//! ethanol:
//!
//! ```text
//! qs     = qsmax S / (Ks + S)
//! qs_ox  = min(qs, qsox_max)
//! qs_red = qs - qs_ox
//! qe     = min(qemax E / (Ke + E), qsox_max - qs_ox)
//! mu     = Yxs_ox qs_ox + Yxs_red qs_red + Yxe qe
//!
//! dX/dt = mu X
//! dS/dt = -qs X
//! dE/dt = (Yes qs_red - qe) X
//! CO2   = (Ycs_ox qs_ox + Ycs_red qs_red + Yce qe) X
//! ```
//!
//! `CO2` is the instantaneous carbon dioxide evolution (g/L/h), compared
//! against the off-gas measurement.

use crate::error::AppError;
use crate::models::{Kinetics, Model, Parameters};

/// Default parameters: `(name, value, min, max, vary)`.
const DEFAULTS: [(&str, f64, f64, f64, bool); 15] = [
    ("qsmax", 1.5, 0.5, 4.0, true),
    ("qsox_max", 0.25, 0.05, 1.0, true),
    ("qemax", 0.2, 0.01, 1.0, true),
    ("Ks", 0.1, 0.001, 1.0, false),
    ("Ke", 0.1, 0.001, 1.0, false),
    ("Yxs_ox", 0.5, 0.3, 0.7, false),
    ("Yxs_red", 0.05, 0.01, 0.2, false),
    ("Yxe", 0.7, 0.3, 1.0, false),
    ("Yes", 0.48, 0.3, 0.51, false),
    ("Ycs_ox", 0.88, 0.5, 1.47, false),
    ("Ycs_red", 0.46, 0.3, 0.5, false),
    ("Yce", 0.9, 0.5, 1.9, false),
    ("X0", 0.1, 0.001, 10.0, false),
    ("S0", 20.0, 0.0, 100.0, false),
    ("E0", 0.0, 0.0, 50.0, false),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YeastCoefficients {
    qsmax: f64,
    qsox_max: f64,
    qemax: f64,
    ks: f64,
    ke: f64,
    yxs_ox: f64,
    yxs_red: f64,
    yxe: f64,
    yes: f64,
    ycs_ox: f64,
    ycs_red: f64,
    yce: f64,
    x0: f64,
    s0: f64,
    e0: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rates {
    qs: f64,
    qs_ox: f64,
    qs_red: f64,
    qe: f64,
}

impl YeastCoefficients {
    fn rates(&self, s: f64, e: f64) -> Rates {
        let qs = self.qsmax * s / (self.ks + s);
        let qs_ox = qs.min(self.qsox_max);
        let qs_red = qs - qs_ox;
        let qe = (self.qemax * e / (self.ke + e)).min((self.qsox_max - qs_ox).max(0.0));
        Rates { qs, qs_ox, qs_red, qe }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct YeastKinetics;

/// The default process model.
pub type Yeast = Model<YeastKinetics>;

impl Kinetics for YeastKinetics {
    type Coefficients = YeastCoefficients;

    fn name(&self) -> &'static str {
        "yeast"
    }

    fn state_names(&self) -> &'static [&'static str] {
        &["cX", "cS", "cE"]
    }

    fn output_names(&self) -> &'static [&'static str] {
        &["cX", "cS", "cE", "CO2"]
    }

    fn default_params(&self) -> Result<Parameters, AppError> {
        Parameters::from_defaults(&DEFAULTS)
    }

    fn coefficients(&self, p: &Parameters) -> Result<YeastCoefficients, AppError> {
        Ok(YeastCoefficients {
            qsmax: p.value("qsmax")?,
            qsox_max: p.value("qsox_max")?,
            qemax: p.value("qemax")?,
            ks: p.value("Ks")?,
            ke: p.value("Ke")?,
            yxs_ox: p.value("Yxs_ox")?,
            yxs_red: p.value("Yxs_red")?,
            yxe: p.value("Yxe")?,
            yes: p.value("Yes")?,
            ycs_ox: p.value("Ycs_ox")?,
            ycs_red: p.value("Ycs_red")?,
            yce: p.value("Yce")?,
            x0: p.value("X0")?,
            s0: p.value("S0")?,
            e0: p.value("E0")?,
        })
    }

    fn initial_state(&self, c: &YeastCoefficients) -> Vec<f64> {
        vec![c.x0, c.s0, c.e0]
    }

    fn rhs(&self, c: &YeastCoefficients, _t: f64, x: &[f64], dx: &mut [f64]) {
        let (bio, s, e) = (x[0].max(0.0), x[1].max(0.0), x[2].max(0.0));
        let r = c.rates(s, e);
        let mu = c.yxs_ox * r.qs_ox + c.yxs_red * r.qs_red + c.yxe * r.qe;

        dx[0] = mu * bio;
        dx[1] = -r.qs * bio;
        dx[2] = (c.yes * r.qs_red - r.qe) * bio;
    }

    fn outputs(&self, c: &YeastCoefficients, x: &[f64], out: &mut [f64]) {
        let (bio, s, e) = (x[0].max(0.0), x[1].max(0.0), x[2].max(0.0));
        let r = c.rates(s, e);

        out[0] = bio;
        out[1] = s;
        out[2] = e;
        out[3] = (c.ycs_ox * r.qs_ox + c.ycs_red * r.qs_red + c.yce * r.qe) * bio;
    }
}
