//! Mixture fitting.
//!
//! Responsibilities:
//!
//! - run EM for a fixed component count from caller-supplied guesses (`em`)
//! - build seeded initial guesses from the data (`init`)
//! - run several independent starts and keep the best (`restarts`)

pub mod em;
pub mod init;
pub mod restarts;

pub use em::*;
pub use init::*;
pub use restarts::*;
