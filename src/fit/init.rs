//! Initial guesses for the EM fitter.
//!
//! Means are chosen with k-means++ style D² seeding: the first mean is a
//! uniformly drawn point, every further mean is a point drawn with probability
//! proportional to its squared distance from the nearest mean chosen so far.
//! Every component starts from the same diagonal covariance, the per-axis
//! variance of the whole point set.
//!
//! All randomness comes from a `StdRng` seeded by the caller, so a seed fully
//! determines the guess.

use nalgebra::{DMatrix, DVector};
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::error::FitError;
use crate::math::sample_covariance;

/// Floor for the initial per-axis variance, relative to the largest axis.
const MIN_VARIANCE_REL: f64 = 1e-6;

/// Initial means and covariances, ready to hand to `fit_multivariate`.
#[derive(Debug, Clone, PartialEq)]
pub struct InitialGuess {
    pub means: Vec<DVector<f64>>,
    pub covariances: Vec<DMatrix<f64>>,
}

/// Build a seeded initial guess for `k` components.
pub fn initial_guess(points: &DMatrix<f64>, k: usize, seed: u64) -> Result<InitialGuess, FitError> {
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

    let mut rng = StdRng::seed_from_u64(seed);
    let chosen = seed_indices(points, k, &mut rng);
    let means = chosen
        .iter()
        .map(|&i| points.column(i).into_owned())
        .collect();

    let cov = sample_covariance(points);
    let largest = cov.diagonal().max().max(1.0);
    let floor = MIN_VARIANCE_REL * largest;
    let diag = cov.diagonal().map(|v| v.max(floor));
    let base = DMatrix::from_diagonal(&diag);

    Ok(InitialGuess {
        means,
        covariances: vec![base; k],
    })
}

/// Indices of `k` distinct points picked by D² sampling.
fn seed_indices(points: &DMatrix<f64>, k: usize, rng: &mut StdRng) -> Vec<usize> {
    let n = points.ncols();
    let mut chosen = Vec::with_capacity(k);
    chosen.push(rng.gen_range(0..n));

    let mut d2: Vec<f64> = (0..n)
        .map(|i| (&points.column(i) - &points.column(chosen[0])).norm_squared())
        .collect();

    while chosen.len() < k {
        let total: f64 = d2.iter().sum();
        let next = if total > 0.0 {
            let target = rng.r#gen::<f64>() * total;
            let mut acc = 0.0;
            let mut pick = None;
            for (i, &w) in d2.iter().enumerate() {
                acc += w;
                if w > 0.0 && acc >= target {
                    pick = Some(i);
                    break;
                }
            }
            // Rounding can leave `acc` a hair below `target`; take the last
            // point with positive weight.
            pick.or_else(|| d2.iter().rposition(|&w| w > 0.0))
        } else {
            None
        };

        // Every remaining point coincides with a chosen mean: take the first
        // unused index so the means stay distinct as indices.
        let next = next.unwrap_or_else(|| (0..n).find(|i| !chosen.contains(i)).unwrap_or(0));
        chosen.push(next);

        for (i, slot) in d2.iter_mut().enumerate() {
            let dist = (&points.column(i) - &points.column(next)).norm_squared();
            if dist < *slot {
                *slot = dist;
            }
        }
        for &c in &chosen {
            d2[c] = 0.0;
        }
    }

    chosen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::{SampleSpec, generate_clusters};

    fn clusters() -> DMatrix<f64> {
        let spec = SampleSpec {
            centers: vec![vec![0.0, 0.0], vec![20.0, 0.0], vec![0.0, 20.0]],
            count_per_cluster: 30,
            spread: 0.5,
            seed: 4,
        };
        generate_clusters(&spec).unwrap().points
    }

    #[test]
    fn same_seed_same_guess() {
        let points = clusters();
        let a = initial_guess(&points, 3, 99).unwrap();
        let b = initial_guess(&points, 3, 99).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn seeding_spreads_means_across_clusters() {
        let points = clusters();
        let guess = initial_guess(&points, 3, 1).unwrap();

        // With clusters 20 apart and spread 0.5, D² seeding essentially never
        // places two means in the same cluster.
        let mut hit = [false; 3];
        for m in &guess.means {
            let label = if m[0] > 10.0 {
                1
            } else if m[1] > 10.0 {
                2
            } else {
                0
            };
            hit[label] = true;
        }
        assert_eq!(hit, [true, true, true]);
    }

    #[test]
    fn covariances_are_diagonal_and_positive() {
        let points = clusters();
        let guess = initial_guess(&points, 2, 0).unwrap();
        assert_eq!(guess.covariances.len(), 2);
        for c in &guess.covariances {
            assert_eq!(c.shape(), (2, 2));
            assert_eq!(c[(0, 1)], 0.0);
            assert!(c[(0, 0)] > 0.0 && c[(1, 1)] > 0.0);
        }
    }

    #[test]
    fn duplicate_points_still_yield_k_means() {
        let points = DMatrix::from_element(2, 5, 3.0);
        let guess = initial_guess(&points, 3, 7).unwrap();
        assert_eq!(guess.means.len(), 3);
        assert!(guess.covariances[0][(0, 0)] > 0.0);
    }

    #[test]
    fn rejects_too_many_components() {
        let points = DMatrix::from_element(2, 2, 1.0);
        let err = initial_guess(&points, 3, 0).unwrap_err();
        assert_eq!(err, FitError::TooManyComponents { k: 3, n: 2 });
    }
}
