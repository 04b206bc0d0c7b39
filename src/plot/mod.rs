//! Terminal plots of a snapshot for non-interactive output, and the variable
//! selection shared with the dashboard charts.

pub mod ascii;
pub mod selection;

pub use ascii::*;
pub use selection::*;
