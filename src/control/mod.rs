//! The monitoring control loop.
//!
//! - triggers, the error state machine and the trigger -> plan rule (`plan`)
//! - the rewrite of insufficient-data failures for display (`failure`)
//! - single-flight guarding of cycles (`guard`)
//! - cycle execution against a fetcher and a model (`runner`)
//! - state carried between cycles by front ends (`session`)

pub mod failure;
pub mod guard;
pub mod plan;
pub mod runner;
pub mod session;

pub use failure::*;
pub use guard::*;
pub use plan::*;
pub use runner::*;
pub use session::*;
