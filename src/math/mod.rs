//! Numerical building blocks: time grids, ODE integration and least squares.

pub mod grid;
pub mod ode;
pub mod ols;

pub use grid::*;
pub use ode::*;
pub use ols::*;
