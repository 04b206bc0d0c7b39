//! Parameter estimation.
//!
//! Responsibilities:
//!
//! - align measured points of the fitted variables on one time grid (`objective`)
//! - minimise the weighted residuals over vary-enabled parameters (`estimator`)

pub mod estimator;
pub mod objective;

pub use estimator::*;
pub use objective::*;
