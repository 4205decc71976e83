//! A fitted Gaussian mixture as a value.
//!
//! `fit_multivariate` hands its results back through in/out parameters and an
//! `EmFit`; `GaussianMixture` bundles the parameters so a model can be scored
//! against new points, saved, and reloaded.

use nalgebra::{DMatrix, DVector};

use crate::error::FitError;
use crate::fit::em::{EStep, EmFit, e_step};
use crate::math::{GaussianFactor, is_symmetric};

/// Tolerance on `Σ πₖ = 1` when building a mixture from raw parts.
const PRIOR_SUM_TOL: f64 = 1e-6;

/// Relative tolerance for the symmetry check on covariances.
const SYMMETRY_TOL: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianMixture {
    pub means: Vec<DVector<f64>>,
    pub covariances: Vec<DMatrix<f64>>,
    pub priors: DVector<f64>,
}

impl GaussianMixture {
    /// Assemble a mixture, checking shapes, priors, and positive-definiteness.
    pub fn new(
        means: Vec<DVector<f64>>,
        covariances: Vec<DMatrix<f64>>,
        priors: DVector<f64>,
    ) -> Result<Self, FitError> {
        let k = means.len();
        if k == 0 {
            return Err(FitError::ZeroComponents);
        }
        if covariances.len() != k {
            return Err(FitError::DimensionMismatch {
                what: "number of covariances",
                expected: k,
                found: covariances.len(),
            });
        }
        if priors.len() != k {
            return Err(FitError::DimensionMismatch {
                what: "number of priors",
                expected: k,
                found: priors.len(),
            });
        }
        let dim = means[0].len();
        for m in &means {
            if m.len() != dim {
                return Err(FitError::DimensionMismatch {
                    what: "mean dimension",
                    expected: dim,
                    found: m.len(),
                });
            }
        }
        for (component, c) in covariances.iter().enumerate() {
            if c.shape() != (dim, dim) {
                return Err(FitError::NonSquareCovariance {
                    component,
                    rows: c.nrows(),
                    cols: c.ncols(),
                    dim,
                });
            }
            // Cholesky only reads the lower triangle.
            if !is_symmetric(c, SYMMETRY_TOL) {
                return Err(FitError::AsymmetricCovariance { component });
            }
        }
        if priors.iter().any(|p| !(p.is_finite() && *p >= 0.0))
            || (priors.sum() - 1.0).abs() > PRIOR_SUM_TOL
        {
            return Err(FitError::InvalidConfig {
                name: "priors",
                message: "must be non-negative and sum to 1",
            });
        }

        let mixture = Self {
            means,
            covariances,
            priors,
        };
        mixture.factors()?;
        Ok(mixture)
    }

    /// Bundle the outputs of a successful `fit_multivariate` call.
    pub fn from_fit(means: Vec<DVector<f64>>, covariances: Vec<DMatrix<f64>>, fit: &EmFit) -> Self {
        Self {
            means,
            covariances,
            priors: fit.priors.clone(),
        }
    }

    pub fn components(&self) -> usize {
        self.means.len()
    }

    pub fn dim(&self) -> usize {
        self.means.first().map_or(0, |m| m.len())
    }

    /// Free parameters: `(K − 1)` priors, `K·d` means, `K·d(d+1)/2` covariances.
    pub fn param_count(&self) -> usize {
        let k = self.components();
        let d = self.dim();
        k.saturating_sub(1) + k * d + k * d * (d + 1) / 2
    }

    /// Total log-likelihood of `points` (`d × N`).
    pub fn log_likelihood(&self, points: &DMatrix<f64>) -> Result<f64, FitError> {
        Ok(self.score(points)?.log_likelihood)
    }

    /// `N × K` posterior membership probabilities for `points`.
    pub fn responsibilities(&self, points: &DMatrix<f64>) -> Result<DMatrix<f64>, FitError> {
        Ok(self.score(points)?.responsibilities)
    }

    /// Most probable component for every point.
    pub fn predict(&self, points: &DMatrix<f64>) -> Result<Vec<usize>, FitError> {
        let resp = self.responsibilities(points)?;
        Ok(hard_labels(&resp))
    }

    /// Bayesian information criterion: `−2 ln L + p ln N`.
    pub fn bic(&self, points: &DMatrix<f64>) -> Result<f64, FitError> {
        let ll = self.log_likelihood(points)?;
        let n = points.ncols() as f64;
        Ok(-2.0 * ll + self.param_count() as f64 * n.ln())
    }

    /// Akaike information criterion: `−2 ln L + 2p`.
    pub fn aic(&self, points: &DMatrix<f64>) -> Result<f64, FitError> {
        let ll = self.log_likelihood(points)?;
        Ok(-2.0 * ll + 2.0 * self.param_count() as f64)
    }

    fn score(&self, points: &DMatrix<f64>) -> Result<EStep, FitError> {
        let (dim, n) = points.shape();
        if n == 0 {
            return Err(FitError::EmptyInput { dim, n });
        }
        if dim != self.dim() {
            return Err(FitError::DimensionMismatch {
                what: "point dimension",
                expected: self.dim(),
                found: dim,
            });
        }
        if points.iter().any(|v| !v.is_finite()) {
            return Err(FitError::NonFiniteInput { what: "points" });
        }
        let factors = self.factors()?;
        e_step(points, &self.priors, &factors)
    }

    fn factors(&self) -> Result<Vec<GaussianFactor>, FitError> {
        self.means
            .iter()
            .zip(&self.covariances)
            .enumerate()
            .map(|(component, (m, c))| {
                GaussianFactor::new(m, c).ok_or(FitError::NotPositiveDefinite { component })
            })
            .collect()
    }
}

/// Argmax of every row; lowest index on ties.
pub fn hard_labels(resp: &DMatrix<f64>) -> Vec<usize> {
    resp.row_iter()
        .map(|row| {
            let mut best = 0;
            for (c, &p) in row.iter().enumerate() {
                if p > row[best] {
                    best = c;
                }
            }
            best
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EmConfig;
    use crate::fit::em::fit_multivariate;

    fn two_blob_model() -> GaussianMixture {
        GaussianMixture::new(
            vec![
                DVector::from_row_slice(&[0.0, 0.0]),
                DVector::from_row_slice(&[5.0, 5.0]),
            ],
            vec![DMatrix::identity(2, 2), DMatrix::identity(2, 2)],
            DVector::from_row_slice(&[0.5, 0.5]),
        )
        .unwrap()
    }

    #[test]
    fn predicts_nearest_blob() {
        let model = two_blob_model();
        let points = DMatrix::from_column_slice(2, 3, &[0.1, -0.2, 4.8, 5.1, 2.0, 1.0]);
        assert_eq!(model.predict(&points).unwrap(), vec![0, 1, 0]);

        let resp = model.responsibilities(&points).unwrap();
        for i in 0..3 {
            assert!((resp.row(i).sum() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn information_criteria_penalize_parameters() {
        let model = two_blob_model();
        // 2 components in 2-D: 1 + 4 + 6
        assert_eq!(model.param_count(), 11);

        let points = DMatrix::from_column_slice(2, 4, &[0.0, 0.0, 1.0, 0.0, 5.0, 5.0, 5.0, 4.0]);
        let ll = model.log_likelihood(&points).unwrap();
        let bic = model.bic(&points).unwrap();
        let aic = model.aic(&points).unwrap();
        assert!((bic - (-2.0 * ll + 11.0 * 4.0_f64.ln())).abs() < 1e-9);
        assert!((aic - (-2.0 * ll + 22.0)).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_priors_and_shapes() {
        let err = GaussianMixture::new(
            vec![DVector::zeros(2)],
            vec![DMatrix::identity(2, 2)],
            DVector::from_row_slice(&[0.7]),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::InvalidConfig { name: "priors", .. }));

        let err = GaussianMixture::new(
            vec![DVector::zeros(2)],
            vec![DMatrix::identity(3, 3)],
            DVector::from_row_slice(&[1.0]),
        )
        .unwrap_err();
        assert!(matches!(err, FitError::NonSquareCovariance { .. }));

        let err = GaussianMixture::new(
            vec![DVector::zeros(2)],
            vec![DMatrix::from_row_slice(2, 2, &[1.0, 50.0, 0.0, 1.0])],
            DVector::from_row_slice(&[1.0]),
        )
        .unwrap_err();
        assert_eq!(err, FitError::AsymmetricCovariance { component: 0 });

        let model = two_blob_model();
        let err = model.log_likelihood(&DMatrix::zeros(3, 2)).unwrap_err();
        assert!(matches!(err, FitError::DimensionMismatch { what: "point dimension", .. }));
    }

    #[test]
    fn scoring_training_points_matches_fit() {
        let points = DMatrix::from_column_slice(
            2,
            6,
            &[0.0, 0.1, 0.2, -0.1, -0.1, 0.0, 6.0, 6.1, 6.2, 5.9, 5.9, 6.0],
        );
        let mut mu = vec![
            DVector::from_row_slice(&[0.5, 0.5]),
            DVector::from_row_slice(&[5.5, 5.5]),
        ];
        let mut sigma = vec![DMatrix::identity(2, 2), DMatrix::identity(2, 2)];
        let fit = fit_multivariate(&points, 2, &mut mu, &mut sigma, &EmConfig::default()).unwrap();

        let model = GaussianMixture::from_fit(mu, sigma, &fit);
        let ll = model.log_likelihood(&points).unwrap();
        assert!((ll - fit.log_likelihood).abs() < 1e-9 * fit.log_likelihood.abs().max(1.0));
        assert_eq!(model.predict(&points).unwrap(), vec![0, 0, 0, 1, 1, 1]);
    }
}
