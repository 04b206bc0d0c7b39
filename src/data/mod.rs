//! Input sources for the control loop.
//!
//! - Azure Files share and local mirror fetchers (`storage`)
//! - synthetic fermentation generator for demos (`synthetic`)

pub mod storage;
pub mod synthetic;

pub use storage::*;
pub use synthetic::*;
