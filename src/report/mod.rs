//! Reporting utilities: formatted terminal output for fits and scores.

pub mod format;

pub use format::*;
