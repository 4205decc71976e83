//! `gmm-fit` library crate.
//!
//! Gaussian mixture models fitted by expectation-maximization. The entry
//! point for callers is [`fit::fit_multivariate`]; everything else supports it
//! (initial guesses, multi-start, scoring, file formats, and the CLI).
//!
//! The binary (`gmm`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - modules are reusable from other programs

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
