//! Shared domain types.
//!
//! These types are kept small and serializable so they can be:
//!
//! - passed to the fitter as plain configuration
//! - exported to JSON/CSV
//! - reloaded later for scoring new points

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FitError;

/// What the M-step does when a component's effective count collapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EmptyComponentPolicy {
    /// Abort the fit with `FitError::EmptyComponent`.
    Fail,
    /// Split the component with the largest effective count along its
    /// principal axis and give one half to the empty component.
    ///
    /// The donor is chosen by largest count, lowest index on ties, so the
    /// outcome is deterministic.
    Split,
}

/// Tuning knobs for a single EM run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmConfig {
    /// Upper bound on M-step/E-step rounds.
    pub max_iter: usize,
    /// Stop when the mean per-point log-likelihood improves by less than this.
    pub tolerance: f64,
    /// Added to every covariance diagonal after the M-step.
    pub reg_covar: f64,
    /// How many times the regularization is multiplied by 10 before a
    /// non-positive-definite covariance is reported as a failure.
    pub max_regularization_attempts: usize,
    /// Effective count below which a component is treated as empty.
    pub empty_threshold: f64,
    pub empty_policy: EmptyComponentPolicy,
    /// Upper bound on reseeds under `EmptyComponentPolicy::Split`.
    pub max_reseeds: usize,
    /// Relative slack allowed on a log-likelihood decrease before it is
    /// reported as `FitError::LikelihoodDecreased`.
    pub monotonic_slack: f64,
}

impl Default for EmConfig {
    fn default() -> Self {
        Self {
            max_iter: 100,
            tolerance: 1e-6,
            reg_covar: 1e-6,
            max_regularization_attempts: 5,
            empty_threshold: 1e-8,
            empty_policy: EmptyComponentPolicy::Fail,
            max_reseeds: 4,
            monotonic_slack: 1e-6,
        }
    }
}

impl EmConfig {
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_reg_covar(mut self, reg_covar: f64) -> Self {
        self.reg_covar = reg_covar;
        self
    }

    pub fn with_empty_policy(mut self, policy: EmptyComponentPolicy) -> Self {
        self.empty_policy = policy;
        self
    }

    /// Reject settings that would make the iteration unbounded or meaningless.
    pub fn validate(&self) -> Result<(), FitError> {
        if self.max_iter == 0 {
            return Err(FitError::InvalidConfig {
                name: "max_iter",
                message: "must be > 0",
            });
        }
        if !(self.tolerance.is_finite() && self.tolerance >= 0.0) {
            return Err(FitError::InvalidConfig {
                name: "tolerance",
                message: "must be finite and >= 0",
            });
        }
        if !(self.reg_covar.is_finite() && self.reg_covar >= 0.0) {
            return Err(FitError::InvalidConfig {
                name: "reg_covar",
                message: "must be finite and >= 0",
            });
        }
        if !(self.empty_threshold.is_finite() && self.empty_threshold >= 0.0) {
            return Err(FitError::InvalidConfig {
                name: "empty_threshold",
                message: "must be finite and >= 0",
            });
        }
        if !(self.monotonic_slack.is_finite() && self.monotonic_slack >= 0.0) {
            return Err(FitError::InvalidConfig {
                name: "monotonic_slack",
                message: "must be finite and >= 0",
            });
        }
        Ok(())
    }
}

/// Summary stats about an ingested point set.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_points: usize,
    pub dim: usize,
    /// Per-axis minimum.
    pub min: Vec<f64>,
    /// Per-axis maximum.
    pub max: Vec<f64>,
}

/// A full `gmm fit` run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment and defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub input: PathBuf,
    pub has_header: bool,
    pub components: usize,
    pub seed: u64,
    /// Number of independent initializations (1 = single fit).
    pub restarts: usize,
    pub em: EmConfig,
    pub export_model: Option<PathBuf>,
    pub export_responsibilities: Option<PathBuf>,
}

/// A saved mixture model (JSON).
///
/// Matrices are stored as nested row vectors so the file stays readable
/// without knowing the storage order of the in-memory type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub generated_at: DateTime<Utc>,
    pub dim: usize,
    pub components: usize,
    pub priors: Vec<f64>,
    pub means: Vec<Vec<f64>>,
    pub covariances: Vec<Vec<Vec<f64>>>,
    pub log_likelihood: f64,
    pub iterations: usize,
    pub converged: bool,
}
