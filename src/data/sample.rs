//! Synthetic cluster generation.
//!
//! Points are drawn from isotropic Gaussians around caller-chosen centers.
//! Output is cluster-major: all points of center 0, then center 1, and so on,
//! so the true label of point `i` is `i / count_per_cluster`.

use nalgebra::DMatrix;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::AppError;

/// What to generate.
#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub centers: Vec<Vec<f64>>,
    pub count_per_cluster: usize,
    /// Standard deviation along every axis.
    pub spread: f64,
    pub seed: u64,
}

#[derive(Debug, Clone)]
pub struct SampleData {
    /// `d × N`, one point per column.
    pub points: DMatrix<f64>,
    /// Index of the generating center for every point.
    pub labels: Vec<usize>,
}

pub fn generate_clusters(spec: &SampleSpec) -> Result<SampleData, AppError> {
    let Some(first) = spec.centers.first() else {
        return Err(AppError::new(2, "At least one cluster center is required."));
    };
    let dim = first.len();
    if dim == 0 {
        return Err(AppError::new(2, "Cluster centers must have at least one coordinate."));
    }
    if let Some(bad) = spec.centers.iter().position(|c| c.len() != dim) {
        return Err(AppError::new(
            2,
            format!(
                "Center {bad} has {} coordinates, expected {dim}.",
                spec.centers[bad].len()
            ),
        ));
    }
    if spec.centers.iter().flatten().any(|v| !v.is_finite()) {
        return Err(AppError::new(2, "Cluster centers must be finite."));
    }
    if spec.count_per_cluster == 0 {
        return Err(AppError::new(2, "Points per cluster must be > 0."));
    }
    if !(spec.spread.is_finite() && spec.spread > 0.0) {
        return Err(AppError::new(2, "Cluster spread must be finite and > 0."));
    }

    let mut rng = StdRng::seed_from_u64(spec.seed);
    let noise = Normal::new(0.0, spec.spread)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;

    let n = spec.centers.len() * spec.count_per_cluster;
    let mut values = Vec::with_capacity(n * dim);
    let mut labels = Vec::with_capacity(n);

    for (label, center) in spec.centers.iter().enumerate() {
        for _ in 0..spec.count_per_cluster {
            for &c in center {
                values.push(c + noise.sample(&mut rng));
            }
            labels.push(label);
        }
    }

    Ok(SampleData {
        points: DMatrix::from_column_slice(dim, n, &values),
        labels,
    })
}

/// Parse a center given as comma-separated coordinates, e.g. `"0,0,0"`.
pub fn parse_center(text: &str) -> Result<Vec<f64>, AppError> {
    text.split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f64>()
                .map_err(|_| AppError::new(2, format!("Invalid center coordinate '{part}' in '{text}'.")))
        })
        .collect()
}
