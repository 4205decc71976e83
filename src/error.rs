//! Error types.
//!
//! - `FitError` is what the library returns when a fit cannot produce valid
//!   parameters. Every variant corresponds to one way the EM fitter refuses to
//!   continue.
//! - `AppError` is the binary-facing error: a message plus the process exit code.

use thiserror::Error;

/// Why a mixture fit failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    #[error("component count must be > 0")]
    ZeroComponents,

    #[error("cannot fit {k} components to {n} points")]
    TooManyComponents { k: usize, n: usize },

    #[error("point set is empty (d={dim}, n={n})")]
    EmptyInput { dim: usize, n: usize },

    #[error("{what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("covariance {component} is {rows}x{cols}, expected {dim}x{dim}")]
    NonSquareCovariance {
        component: usize,
        rows: usize,
        cols: usize,
        dim: usize,
    },

    #[error("covariance {component} is not symmetric")]
    AsymmetricCovariance { component: usize },

    #[error("covariance {component} is not positive-definite")]
    NotPositiveDefinite { component: usize },

    #[error("non-finite value in {what}")]
    NonFiniteInput { what: &'static str },

    #[error("non-finite value during {what}")]
    NonFinite { what: &'static str },

    #[error("component {component} lost all support at iteration {iteration}")]
    EmptyComponent { component: usize, iteration: usize },

    #[error("log-likelihood decreased at iteration {iteration}: {previous} -> {current}")]
    LikelihoodDecreased {
        iteration: usize,
        previous: f64,
        current: f64,
    },

    #[error("invalid setting '{name}': {message}")]
    InvalidConfig {
        name: &'static str,
        message: &'static str,
    },
}

impl FitError {
    /// True for failures detected before any iteration runs.
    pub fn is_precondition(&self) -> bool {
        match self {
            FitError::ZeroComponents
            | FitError::TooManyComponents { .. }
            | FitError::EmptyInput { .. }
            | FitError::DimensionMismatch { .. }
            | FitError::NonSquareCovariance { .. }
            | FitError::AsymmetricCovariance { .. }
            | FitError::NonFiniteInput { .. }
            | FitError::InvalidConfig { .. } => true,
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl From<FitError> for AppError {
    fn from(err: FitError) -> Self {
        let code = match &err {
            FitError::TooManyComponents { .. } | FitError::EmptyInput { .. } => 3,
            e if e.is_precondition() => 2,
            _ => 4,
        };
        AppError::new(code, format!("Fit failed: {err}"))
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
