//! Multi-start fitting.
//!
//! EM only finds a local maximum, so a common remedy is to fit several
//! independent initializations and keep the best. Each start gets its own
//! seeded guess and its own `mu`/`sigma` storage; the single fits share
//! nothing, so they run in parallel (rayon) without touching the fitter.
//!
//! Selection is deterministic: highest final log-likelihood wins, ties go to
//! the earlier seed.

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use tracing::{info, warn};

use crate::domain::EmConfig;
use crate::error::FitError;
use crate::fit::em::{EmFit, fit_multivariate};
use crate::fit::init::initial_guess;

/// One successful start.
#[derive(Debug, Clone)]
pub struct RestartRun {
    pub seed: u64,
    pub means: Vec<DVector<f64>>,
    pub covariances: Vec<DMatrix<f64>>,
    pub fit: EmFit,
}

/// Outcome of a multi-start fit.
#[derive(Debug, Clone)]
pub struct RestartSummary {
    pub best: RestartRun,
    /// Number of starts attempted (successful or not).
    pub attempted: usize,
    /// Starts that failed, with the reason (for diagnostics).
    pub failures: Vec<(u64, FitError)>,
}

/// Seeds for `count` starts derived from a base seed.
pub fn restart_seeds(base: u64, count: usize) -> Vec<u64> {
    (0..count as u64).map(|i| base.wrapping_add(i)).collect()
}

/// Fit one mixture per seed and keep the best.
///
/// If every start fails, the first start's error is returned.
pub fn fit_restarts(
    points: &DMatrix<f64>,
    k: usize,
    seeds: &[u64],
    config: &EmConfig,
) -> Result<RestartSummary, FitError> {
    if seeds.is_empty() {
        return Err(FitError::InvalidConfig {
            name: "restarts",
            message: "need at least one seed",
        });
    }

    let runs: Vec<(u64, Result<RestartRun, FitError>)> = seeds
        .par_iter()
        .map(|&seed| (seed, fit_one(points, k, seed, config)))
        .collect();

    let mut best: Option<RestartRun> = None;
    let mut failures = Vec::new();
    let mut first_error = None;

    for (seed, run) in runs {
        match run {
            Ok(run) => {
                // Strict `>` keeps the earlier seed on ties.
                let better = match &best {
                    Some(b) => run.fit.log_likelihood > b.fit.log_likelihood,
                    None => true,
                };
                if better {
                    best = Some(run);
                }
            }
            Err(e) => {
                warn!(seed, error = %e, "restart failed");
                if first_error.is_none() {
                    first_error = Some(e.clone());
                }
                failures.push((seed, e));
            }
        }
    }

    let Some(best) = best else {
        return Err(first_error.unwrap_or(FitError::InvalidConfig {
            name: "restarts",
            message: "need at least one seed",
        }));
    };

    info!(
        seed = best.seed,
        log_likelihood = best.fit.log_likelihood,
        attempted = seeds.len(),
        failed = failures.len(),
        "selected best restart"
    );

    Ok(RestartSummary {
        best,
        attempted: seeds.len(),
        failures,
    })
}

fn fit_one(
    points: &DMatrix<f64>,
    k: usize,
    seed: u64,
    config: &EmConfig,
) -> Result<RestartRun, FitError> {
    let guess = initial_guess(points, k, seed)?;
    let mut means = guess.means;
    let mut covariances = guess.covariances;
    let fit = fit_multivariate(points, k, &mut means, &mut covariances, config)?;
    Ok(RestartRun {
        seed,
        means,
        covariances,
        fit,
    })
}
