//! Fitted model representations.
//!
//! Models are plain values so that scoring, export, and reporting code can stay
//! independent of how the parameters were estimated.

pub mod mixture;

pub use mixture::*;
