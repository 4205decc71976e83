//! Multivariate normal log-density.
//!
//! Densities are only ever evaluated in log space. For a covariance `Σ = L Lᵀ`:
//!
//! ```text
//! ln N(x | μ, Σ) = -½ (d ln 2π + ln|Σ| + ‖L⁻¹(x − μ)‖²)
//! ln|Σ|          = 2 Σᵢ ln Lᵢᵢ
//! ```
//!
//! so no explicit inverse or determinant is formed.

use nalgebra::{Cholesky, DMatrix, DVector, DVectorView, Dyn};

/// `ln(2π)`.
pub const LN_2PI: f64 = 1.837_877_066_409_345_5;

/// A Gaussian component with its covariance factorized once.
#[derive(Debug, Clone)]
pub struct GaussianFactor {
    mean: DVector<f64>,
    chol: Cholesky<f64, Dyn>,
    /// `-½ (d ln 2π + ln|Σ|)`
    log_norm: f64,
}

impl GaussianFactor {
    /// Factorize `cov`.
    ///
    /// Returns `None` if `cov` is not positive-definite or contains non-finite
    /// values.
    pub fn new(mean: &DVector<f64>, cov: &DMatrix<f64>) -> Option<Self> {
        if cov.iter().any(|v| !v.is_finite()) || mean.iter().any(|v| !v.is_finite()) {
            return None;
        }
        let chol = cov.clone().cholesky()?;
        let log_det = 2.0 * chol.l_dirty().diagonal().iter().map(|v| v.ln()).sum::<f64>();
        if !log_det.is_finite() {
            return None;
        }
        let d = mean.len() as f64;
        Some(Self {
            mean: mean.clone(),
            chol,
            log_norm: -0.5 * (d * LN_2PI + log_det),
        })
    }

    /// `ln|Σ|`
    pub fn log_det(&self) -> f64 {
        let d = self.mean.len() as f64;
        -2.0 * self.log_norm - d * LN_2PI
    }

    /// Squared Mahalanobis distance `(x − μ)ᵀ Σ⁻¹ (x − μ)`.
    pub fn mahalanobis_sq(&self, x: DVectorView<'_, f64>) -> f64 {
        let diff = &x - &self.mean;
        match self.chol.l_dirty().solve_lower_triangular(&diff) {
            Some(z) => z.norm_squared(),
            None => f64::INFINITY,
        }
    }

    pub fn log_pdf(&self, x: DVectorView<'_, f64>) -> f64 {
        self.log_norm - 0.5 * self.mahalanobis_sq(x)
    }
}

/// Log-sum-exp for numerical stability.
pub fn logsumexp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }
    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }
    max_val
        + values
            .iter()
            .map(|&v| (v - max_val).exp())
            .sum::<f64>()
            .ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_normal_density_at_origin() {
        let mean = DVector::zeros(3);
        let cov = DMatrix::identity(3, 3);
        let g = GaussianFactor::new(&mean, &cov).unwrap();

        let x = DVector::zeros(3);
        let expected = -1.5 * LN_2PI;
        assert!((g.log_pdf(x.column(0)) - expected).abs() < 1e-12);
    }

    #[test]
    fn density_matches_closed_form_for_diagonal_covariance() {
        let mean = DVector::from_row_slice(&[1.0, -2.0]);
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 0.0, 0.0, 0.25]);
        let g = GaussianFactor::new(&mean, &cov).unwrap();

        let x = DVector::from_row_slice(&[3.0, -1.5]);
        // z = (2/2, 0.5/0.5) -> |z|² = 2, ln|Σ| = ln(1) = 0
        let expected = -0.5 * (2.0 * LN_2PI + 0.0 + 2.0);
        assert!((g.log_pdf(x.column(0)) - expected).abs() < 1e-12);
        assert!(g.log_det().abs() < 1e-12);
    }

    #[test]
    fn rejects_indefinite_covariance() {
        let mean = DVector::zeros(2);
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(GaussianFactor::new(&mean, &cov).is_none());
    }

    #[test]
    fn rejects_nan_covariance() {
        let mean = DVector::zeros(2);
        let cov = DMatrix::from_row_slice(2, 2, &[f64::NAN, 0.0, 0.0, 1.0]);
        assert!(GaussianFactor::new(&mean, &cov).is_none());
    }

    #[test]
    fn logsumexp_handles_large_magnitudes() {
        let v = [-1000.0, -1000.0];
        let got = logsumexp(&v);
        assert!((got - (-1000.0 + 2.0_f64.ln())).abs() < 1e-12);
        assert_eq!(logsumexp(&[]), f64::NEG_INFINITY);
        assert_eq!(logsumexp(&[f64::NEG_INFINITY]), f64::NEG_INFINITY);
    }
}
