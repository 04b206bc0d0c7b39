//! Domain types used throughout the monitor.
//!
//! This module defines:
//!
//! - time-indexed tables and parameter-table rows (`types`)
//! - the run configuration object and its option groups (`config`)
//! - the session snapshot exchanged with the presentation layer (`snapshot`)

pub mod config;
pub mod snapshot;
pub mod types;

pub use config::*;
pub use snapshot::*;
pub use types::*;
