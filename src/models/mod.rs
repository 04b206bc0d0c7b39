//! Process models.
//!
//! A model couples a set of named, bounded parameters with kinetics that can be
//! simulated over a time grid and fitted to an experiment. The control loop only
//! talks to the `ProcessModel` trait so that alternative models (or test stubs)
//! can be plugged in.

pub mod kinetic;
pub mod params;
pub mod yeast;

pub use kinetic::*;
pub use params::*;
pub use yeast::*;
