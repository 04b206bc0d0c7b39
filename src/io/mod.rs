//! Input/output helpers.
//!
//! - experiment loading from the downloaded CSV files (`experiment`)
//! - snapshot JSON read/write (`snapshot`)
//! - table exports to CSV (`export`)

pub mod experiment;
pub mod export;
pub mod snapshot;

pub use experiment::*;
pub use export::*;
pub use snapshot::*;

#[cfg(test)]
pub(crate) mod testutil;
