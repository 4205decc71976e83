//! Expectation-Maximization for a full-covariance Gaussian mixture.
//!
//! Given:
//! - a `d × N` point matrix (one point per column)
//! - a component count `K`
//! - initial means `μₖ` and covariances `Σₖ`
//!
//! we alternate:
//! - **E-step**: `γₙₖ ∝ πₖ N(xₙ | μₖ, Σₖ)`, computed in log space and
//!   normalized per row with log-sum-exp
//! - **M-step**: `Nₖ = Σₙ γₙₖ`, `μₖ = Σₙ γₙₖ xₙ / Nₖ`,
//!   `Σₖ = Σₙ γₙₖ (xₙ − μₖ)(xₙ − μₖ)ᵀ / Nₖ + εI`, `πₖ = Nₖ / N`
//!
//! until the mean per-point log-likelihood stops improving or the iteration
//! budget runs out.
//!
//! `ε` is `reg_covar` scaled by the mean per-axis variance of the data. When
//! the likelihood dips while a covariance sits on that floor (collinear or
//! collapsed components), the fit keeps the previous round and stops.
//!
//! The caller's `mu`/`sigma` are only overwritten when the fit succeeds, so a
//! failed call leaves the initial guesses exactly as they were.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info, warn};

use crate::domain::{EmConfig, EmptyComponentPolicy};
use crate::error::FitError;
use crate::math::{
    GaussianFactor, is_symmetric, logsumexp, principal_axis, sample_covariance,
    smallest_eigenvalue, weighted_covariance, weighted_mean,
};

/// Relative tolerance for the symmetry check on caller-supplied covariances.
const SYMMETRY_TOL: f64 = 1e-9;

/// A covariance whose smallest eigenvalue is within this multiple of the
/// regularization is treated as sitting on the εI floor. Above it, the εI bias
/// per round stays inside the `N·d·reg_covar` slack.
const FLOOR_FACTOR: f64 = 1e3;

/// Result of a successful fit.
///
/// The fitted means and covariances are written back through the `mu` and
/// `sigma` arguments of `fit_multivariate`; everything else lives here.
#[derive(Debug, Clone)]
pub struct EmFit {
    /// Mixing weights, length `K`, summing to 1.
    pub priors: DVector<f64>,
    /// `N × K` posterior membership probabilities; every row sums to 1.
    pub responsibilities: DMatrix<f64>,
    /// Total data log-likelihood under the returned parameters.
    pub log_likelihood: f64,
    /// Total log-likelihood after the initial E-step and after each iteration.
    pub history: Vec<f64>,
    /// Number of M-step/E-step rounds performed.
    pub iterations: usize,
    /// `false` means the iteration budget ran out first. The parameters are
    /// still valid, just not settled.
    pub converged: bool,
    /// Components reseeded under `EmptyComponentPolicy::Split`.
    pub reseeds: usize,
}

/// Output of one E-step.
#[derive(Debug, Clone)]
pub(crate) struct EStep {
    pub responsibilities: DMatrix<f64>,
    pub log_likelihood: f64,
}

/// Working copy of the mixture parameters.
#[derive(Debug, Clone)]
struct Params {
    means: Vec<DVector<f64>>,
    covs: Vec<DMatrix<f64>>,
    priors: DVector<f64>,
}

/// Fit a `K`-component Gaussian mixture to `points` by EM.
///
/// `mu` and `sigma` hold the initial guesses on entry and the fitted values
/// on `Ok`. On `Err` they are left untouched.
pub fn fit_multivariate(
    points: &DMatrix<f64>,
    k: usize,
    mu: &mut Vec<DVector<f64>>,
    sigma: &mut Vec<DMatrix<f64>>,
    config: &EmConfig,
) -> Result<EmFit, FitError> {
    config.validate()?;
    validate_inputs(points, k, mu, sigma)?;

    let n = points.ncols();
    let dim = points.nrows();
    let reg = regularization(points, config.reg_covar);
    let span = tracing::debug_span!("em", k, dim, n, reg);
    let _guard = span.enter();

    let mut params = Params {
        means: mu.clone(),
        covs: sigma.clone(),
        priors: DVector::from_element(k, 1.0 / k as f64),
    };

    let factors = params
        .means
        .iter()
        .zip(&params.covs)
        .enumerate()
        .map(|(component, (m, c))| {
            GaussianFactor::new(m, c).ok_or(FitError::NotPositiveDefinite { component })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut estep = e_step(points, &params.priors, &factors)?;
    let mut history = vec![estep.log_likelihood];
    let mut iterations = 0;
    let mut converged = false;
    let mut reseeds = 0;

    for iteration in 1..=config.max_iter {
        let before = params.clone();
        let reseeded = m_step(
            points,
            &estep.responsibilities,
            &mut params,
            config,
            reg,
            iteration,
            &mut reseeds,
        )?;
        let factors = factorize_all(&params.means, &mut params.covs, config, reg)?;
        let next = e_step(points, &params.priors, &factors)?;

        let previous = estep.log_likelihood;
        let current = next.log_likelihood;
        let delta = current - previous;

        debug!(iteration, log_likelihood = current, delta, reseeded, "em iteration");

        // A reseed is not an EM step, so neither the monotonicity guarantee
        // nor the convergence test applies to the round that follows it.
        if !reseeded {
            let slack = config.monotonic_slack * previous.abs().max(1.0)
                + (n * dim) as f64 * config.reg_covar;
            if delta < -slack {
                // εI dominates a collapsed direction, so the update is no
                // longer an exact EM step. Keep the last good parameters.
                if at_regularization_floor(&before.covs, reg)
                    || at_regularization_floor(&params.covs, reg)
                {
                    warn!(
                        iteration,
                        previous,
                        current,
                        "log-likelihood dropped with a covariance at the regularization floor; stopping"
                    );
                    params = before;
                    converged = true;
                    break;
                }
                return Err(FitError::LikelihoodDecreased {
                    iteration,
                    previous,
                    current,
                });
            }
        }

        history.push(current);
        estep = next;
        iterations = iteration;

        if !reseeded && delta / (n as f64) < config.tolerance {
            converged = true;
            break;
        }
    }

    if converged {
        info!(iterations, log_likelihood = estep.log_likelihood, "em converged");
    } else {
        warn!(
            iterations,
            log_likelihood = estep.log_likelihood,
            "em stopped at iteration budget without converging"
        );
    }

    *mu = params.means;
    *sigma = params.covs;

    Ok(EmFit {
        priors: params.priors,
        responsibilities: estep.responsibilities,
        log_likelihood: estep.log_likelihood,
        history,
        iterations,
        converged,
        reseeds,
    })
}

/// Diagonal regularization actually added to every covariance.
///
/// `reg_covar` is relative: it is scaled by the mean per-axis variance of the
/// data (never less than 1), so the εI floor keeps the same conditioning
/// whatever units the points are in.
pub fn regularization(points: &DMatrix<f64>, reg_covar: f64) -> f64 {
    let dim = points.nrows().max(1) as f64;
    let mean_variance = sample_covariance(points).trace() / dim;
    if mean_variance.is_finite() {
        reg_covar * mean_variance.max(1.0)
    } else {
        reg_covar
    }
}

fn at_regularization_floor(covs: &[DMatrix<f64>], reg: f64) -> bool {
    covs.iter()
        .any(|c| smallest_eigenvalue(c) <= FLOOR_FACTOR * reg)
}

/// Check every precondition before touching any state.
fn validate_inputs(
    points: &DMatrix<f64>,
    k: usize,
    mu: &[DVector<f64>],
    sigma: &[DMatrix<f64>],
) -> Result<(), FitError> {
    let (dim, n) = points.shape();
    if k == 0 {
        return Err(FitError::ZeroComponents);
    }
    if dim == 0 || n == 0 {
        return Err(FitError::EmptyInput { dim, n });
    }
    if k > n {
        return Err(FitError::TooManyComponents { k, n });
    }
    if points.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteInput { what: "points" });
    }
    if mu.len() != k {
        return Err(FitError::DimensionMismatch {
            what: "number of initial means",
            expected: k,
            found: mu.len(),
        });
    }
    if sigma.len() != k {
        return Err(FitError::DimensionMismatch {
            what: "number of initial covariances",
            expected: k,
            found: sigma.len(),
        });
    }
    for m in mu {
        if m.len() != dim {
            return Err(FitError::DimensionMismatch {
                what: "mean dimension",
                expected: dim,
                found: m.len(),
            });
        }
        if m.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteInput { what: "initial means" });
        }
    }
    for (component, s) in sigma.iter().enumerate() {
        let (rows, cols) = s.shape();
        if rows != dim || cols != dim {
            return Err(FitError::NonSquareCovariance {
                component,
                rows,
                cols,
                dim,
            });
        }
        if s.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteInput {
                what: "initial covariances",
            });
        }
        if !is_symmetric(s, SYMMETRY_TOL) {
            return Err(FitError::AsymmetricCovariance { component });
        }
    }
    Ok(())
}

/// Posterior responsibilities and total log-likelihood for fixed parameters.
pub(crate) fn e_step(
    points: &DMatrix<f64>,
    priors: &DVector<f64>,
    factors: &[GaussianFactor],
) -> Result<EStep, FitError> {
    let n = points.ncols();
    let k = factors.len();
    let log_priors: Vec<f64> = priors.iter().map(|p| p.ln()).collect();

    let mut resp = DMatrix::zeros(n, k);
    let mut log_probs = vec![0.0; k];
    let mut total = 0.0;

    for i in 0..n {
        let x = points.column(i);
        for (c, factor) in factors.iter().enumerate() {
            log_probs[c] = log_priors[c] + factor.log_pdf(x);
        }
        let log_sum = logsumexp(&log_probs);
        if !log_sum.is_finite() {
            return Err(FitError::NonFinite {
                what: "log-likelihood",
            });
        }
        for c in 0..k {
            resp[(i, c)] = (log_probs[c] - log_sum).exp();
        }
        total += log_sum;
    }

    Ok(EStep {
        responsibilities: resp,
        log_likelihood: total,
    })
}

/// Re-estimate parameters from responsibilities.
///
/// Returns whether any component was reseeded.
fn m_step(
    points: &DMatrix<f64>,
    resp: &DMatrix<f64>,
    params: &mut Params,
    config: &EmConfig,
    reg: f64,
    iteration: usize,
    reseeds: &mut usize,
) -> Result<bool, FitError> {
    let n = points.ncols() as f64;
    let k = resp.ncols();
    let dim = points.nrows();
    let identity = DMatrix::<f64>::identity(dim, dim);

    let mut empty = Vec::new();
    for c in 0..k {
        let weights: Vec<f64> = resp.column(c).iter().copied().collect();
        let nk: f64 = weights.iter().sum();
        params.priors[c] = nk / n;
        if nk < config.empty_threshold {
            empty.push(c);
            continue;
        }
        let mean = weighted_mean(points, &weights, nk);
        let cov = weighted_covariance(points, &weights, &mean, nk) + &identity * reg;
        params.means[c] = mean;
        params.covs[c] = cov;
    }

    if empty.is_empty() {
        normalize_priors(&mut params.priors);
        return Ok(false);
    }

    for &component in &empty {
        match config.empty_policy {
            EmptyComponentPolicy::Fail => {
                return Err(FitError::EmptyComponent {
                    component,
                    iteration,
                });
            }
            EmptyComponentPolicy::Split => {
                if *reseeds >= config.max_reseeds {
                    return Err(FitError::EmptyComponent {
                        component,
                        iteration,
                    });
                }
                let donor = largest_component(&params.priors, &empty);
                warn!(component, donor, iteration, "empty component; splitting largest");
                split_component(params, donor, component);
                *reseeds += 1;
            }
        }
    }

    normalize_priors(&mut params.priors);
    Ok(true)
}

/// Index of the heaviest component not in `exclude`; lowest index on ties.
fn largest_component(priors: &DVector<f64>, exclude: &[usize]) -> usize {
    let mut best: Option<usize> = None;
    for (c, &p) in priors.iter().enumerate() {
        if exclude.contains(&c) {
            continue;
        }
        match best {
            Some(b) if priors[b] >= p => {}
            _ => best = Some(c),
        }
    }
    // At least one component always carries mass because the counts sum to N.
    best.unwrap_or(0)
}

/// Move `target` onto one half of `donor`, split along the donor's principal axis.
fn split_component(params: &mut Params, donor: usize, target: usize) {
    let (lambda, axis) = principal_axis(&params.covs[donor]);
    let offset = axis * lambda.max(0.0).sqrt();
    let center = params.means[donor].clone();

    params.means[donor] = &center + &offset;
    params.means[target] = &center - &offset;
    params.covs[target] = params.covs[donor].clone();

    let half = params.priors[donor] / 2.0;
    params.priors[donor] = half;
    params.priors[target] = half;
}

fn normalize_priors(priors: &mut DVector<f64>) {
    let total = priors.sum();
    if total > 0.0 {
        *priors /= total;
    }
}

/// Factorize every covariance, escalating the diagonal jitter on failure.
///
/// A covariance that needed extra jitter is replaced by the jittered matrix so
/// the returned parameters match the densities actually used.
fn factorize_all(
    means: &[DVector<f64>],
    covs: &mut [DMatrix<f64>],
    config: &EmConfig,
    reg: f64,
) -> Result<Vec<GaussianFactor>, FitError> {
    let mut factors = Vec::with_capacity(means.len());
    for (component, (mean, cov)) in means.iter().zip(covs.iter_mut()).enumerate() {
        if cov.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFinite {
                what: "covariance update",
            });
        }
        if let Some(f) = GaussianFactor::new(mean, cov) {
            factors.push(f);
            continue;
        }

        let dim = cov.nrows();
        let mut jitter = reg.max(1e-12);
        let mut repaired = None;
        for attempt in 1..=config.max_regularization_attempts {
            jitter *= 10.0;
            warn!(component, attempt, jitter, "covariance not positive-definite; adding jitter");
            let candidate = &*cov + DMatrix::<f64>::identity(dim, dim) * jitter;
            if let Some(f) = GaussianFactor::new(mean, &candidate) {
                repaired = Some((candidate, f));
                break;
            }
        }

        match repaired {
            Some((candidate, f)) => {
                *cov = candidate;
                factors.push(f);
            }
            None => return Err(FitError::NotPositiveDefinite { component }),
        }
    }
    Ok(factors)
}
