//! `bioprocess-monitor` library crate.
//!
//! The binary (`biomon`) is a thin wrapper around this library so that:
//!
//! - the control loop is testable without a terminal or network
//! - fetchers, loaders and models can be swapped behind traits
//! - presentation (TUI, text reports) stays separate from coordination logic

pub mod app;
pub mod cli;
pub mod control;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
pub mod tui;
