//! Input/output helpers.
//!
//! - CSV point ingest + validation (`ingest`)
//! - point and responsibility CSV exports (`export`)
//! - model JSON read/write (`model`)

pub mod export;
pub mod ingest;
pub mod model;

pub use export::*;
pub use ingest::*;
pub use model::*;
