//! Mathematical utilities: Gaussian log-densities and weighted moments.

pub mod gaussian;
pub mod moments;

pub use gaussian::*;
pub use moments::*;
