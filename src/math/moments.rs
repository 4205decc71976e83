//! Weighted first and second moments of a point set.
//!
//! Points are stored column-wise: a `d × N` matrix holds `N` points of
//! dimension `d`.

use nalgebra::{DMatrix, DVector, SymmetricEigen};

/// `Σn wₙ xₙ / total`
pub fn weighted_mean(points: &DMatrix<f64>, weights: &[f64], total: f64) -> DVector<f64> {
    let mut mean = DVector::zeros(points.nrows());
    for (n, &w) in weights.iter().enumerate() {
        if w != 0.0 {
            mean.axpy(w, &points.column(n), 1.0);
        }
    }
    mean / total
}

/// `Σn wₙ (xₙ − μ)(xₙ − μ)ᵀ / total`, symmetrized.
pub fn weighted_covariance(
    points: &DMatrix<f64>,
    weights: &[f64],
    mean: &DVector<f64>,
    total: f64,
) -> DMatrix<f64> {
    let d = points.nrows();
    let mut cov = DMatrix::zeros(d, d);
    for (n, &w) in weights.iter().enumerate() {
        if w != 0.0 {
            let diff = &points.column(n) - mean;
            cov.ger(w, &diff, &diff, 1.0);
        }
    }
    cov /= total;
    symmetrize(&mut cov);
    cov
}

/// Unweighted sample mean.
pub fn sample_mean(points: &DMatrix<f64>) -> DVector<f64> {
    let n = points.ncols();
    weighted_mean(points, &vec![1.0; n], n as f64)
}

/// Biased (1/N) sample covariance.
pub fn sample_covariance(points: &DMatrix<f64>) -> DMatrix<f64> {
    let n = points.ncols();
    let mean = sample_mean(points);
    weighted_covariance(points, &vec![1.0; n], &mean, n as f64)
}

/// Replace `m` with `(m + mᵀ) / 2`.
pub fn symmetrize(m: &mut DMatrix<f64>) {
    let d = m.nrows();
    for i in 0..d {
        for j in (i + 1)..d {
            let v = 0.5 * (m[(i, j)] + m[(j, i)]);
            m[(i, j)] = v;
            m[(j, i)] = v;
        }
    }
}

/// Symmetric up to `rel_tol` of the largest absolute entry (at least 1).
pub fn is_symmetric(m: &DMatrix<f64>, rel_tol: f64) -> bool {
    if !m.is_square() {
        return false;
    }
    let scale = m.amax().max(1.0);
    let d = m.nrows();
    for i in 0..d {
        for j in (i + 1)..d {
            if (m[(i, j)] - m[(j, i)]).abs() > rel_tol * scale {
                return false;
            }
        }
    }
    true
}

pub fn smallest_eigenvalue(m: &DMatrix<f64>) -> f64 {
    SymmetricEigen::new(m.clone()).eigenvalues.min()
}

/// Largest eigenvalue and its unit eigenvector.
pub fn principal_axis(cov: &DMatrix<f64>) -> (f64, DVector<f64>) {
    let eig = SymmetricEigen::new(cov.clone());
    let mut best = 0;
    for i in 1..eig.eigenvalues.len() {
        if eig.eigenvalues[i] > eig.eigenvalues[best] {
            best = i;
        }
    }
    (
        eig.eigenvalues[best],
        eig.eigenvectors.column(best).into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> DMatrix<f64> {
        // Four corners of a 2x2 square centered at (1, 1).
        DMatrix::from_column_slice(2, 4, &[0.0, 0.0, 2.0, 0.0, 0.0, 2.0, 2.0, 2.0])
    }

    #[test]
    fn sample_moments_of_square() {
        let pts = square();
        let mean = sample_mean(&pts);
        assert!((mean[0] - 1.0).abs() < 1e-12);
        assert!((mean[1] - 1.0).abs() < 1e-12);

        let cov = sample_covariance(&pts);
        assert!((cov[(0, 0)] - 1.0).abs() < 1e-12);
        assert!((cov[(1, 1)] - 1.0).abs() < 1e-12);
        assert!(cov[(0, 1)].abs() < 1e-12);
    }

    #[test]
    fn zero_weights_are_ignored() {
        let pts = square();
        let w = [1.0, 0.0, 0.0, 1.0];
        let mean = weighted_mean(&pts, &w, 2.0);
        assert!((mean[0] - 1.0).abs() < 1e-12);

        let cov = weighted_covariance(&pts, &w, &mean, 2.0);
        // Only the diagonal corners contribute: perfectly correlated.
        assert!((cov[(0, 1)] - 1.0).abs() < 1e-12);
        assert!((cov[(0, 1)] - cov[(1, 0)]).abs() < 1e-15);
    }

    #[test]
    fn symmetry_check_uses_relative_tolerance() {
        let mut m = DMatrix::from_row_slice(2, 2, &[1e6, 1.0, 1.0 + 1e-6, 1e6]);
        assert!(is_symmetric(&m, 1e-9));
        m[(0, 1)] = 5.0;
        assert!(!is_symmetric(&m, 1e-9));
        assert!(!is_symmetric(&DMatrix::zeros(2, 3), 1e-9));
    }

    #[test]
    fn smallest_eigenvalue_of_rank_deficient_matrix() {
        let m = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 4.0]);
        assert!(smallest_eigenvalue(&m).abs() < 1e-12);
        assert!((smallest_eigenvalue(&DMatrix::identity(3, 3)) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn principal_axis_of_elongated_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[9.0, 0.0, 0.0, 1.0]);
        let (lambda, v) = principal_axis(&cov);
        assert!((lambda - 9.0).abs() < 1e-9);
        assert!((v[0].abs() - 1.0).abs() < 1e-9);
        assert!(v[1].abs() < 1e-9);
    }
}
