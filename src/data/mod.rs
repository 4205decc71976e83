//! Data sources: seeded synthetic clusters.

pub mod sample;

pub use sample::*;
