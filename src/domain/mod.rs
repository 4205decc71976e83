//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - EM tuning (`EmConfig`, `EmptyComponentPolicy`)
//! - run configuration derived from the CLI (`FitConfig`)
//! - the portable model file (`ModelFile`)

pub mod types;

pub use types::*;
