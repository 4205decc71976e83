//! Read/write model JSON files.
//!
//! Model JSON is the portable representation of a fitted mixture: priors,
//! means, and full covariances, plus the fit's final log-likelihood and
//! iteration count. The schema is defined by `domain::ModelFile`.

use std::fs::File;
use std::path::Path;

use chrono::Utc;
use nalgebra::{DMatrix, DVector};

use crate::domain::ModelFile;
use crate::error::AppError;
use crate::fit::EmFit;
use crate::models::GaussianMixture;

/// Snapshot a fitted mixture into its file representation.
pub fn model_file_from(model: &GaussianMixture, fit: &EmFit) -> ModelFile {
    ModelFile {
        tool: "gmm".to_string(),
        generated_at: Utc::now(),
        dim: model.dim(),
        components: model.components(),
        priors: model.priors.iter().copied().collect(),
        means: model.means.iter().map(|m| m.iter().copied().collect()).collect(),
        covariances: model
            .covariances
            .iter()
            .map(|c| c.row_iter().map(|r| r.iter().copied().collect()).collect())
            .collect(),
        log_likelihood: fit.log_likelihood,
        iterations: fit.iterations,
        converged: fit.converged,
    }
}

/// Rebuild a mixture from its file representation, re-validating everything.
pub fn mixture_from_model_file(file: &ModelFile) -> Result<GaussianMixture, AppError> {
    let dim = file.dim;
    if file.means.len() != file.components || file.covariances.len() != file.components {
        return Err(AppError::new(
            2,
            format!(
                "Model JSON declares {} components but has {} means and {} covariances.",
                file.components,
                file.means.len(),
                file.covariances.len()
            ),
        ));
    }

    let means = file.means.iter().map(|m| DVector::from_row_slice(m)).collect();
    let mut covariances = Vec::with_capacity(file.components);
    for (c, rows) in file.covariances.iter().enumerate() {
        if rows.len() != dim || rows.iter().any(|r| r.len() != dim) {
            return Err(AppError::new(
                2,
                format!("Covariance {c} in model JSON is not {dim}x{dim}."),
            ));
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        covariances.push(DMatrix::from_row_slice(dim, dim, &flat));
    }
    let priors = DVector::from_row_slice(&file.priors);

    GaussianMixture::new(means, covariances, priors)
        .map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))
}

/// Write a model JSON file.
pub fn write_model_json(path: &Path, model: &GaussianMixture, fit: &EmFit) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create model JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, &model_file_from(model, fit))
        .map_err(|e| AppError::new(2, format!("Failed to write model JSON: {e}")))?;
    Ok(())
}

/// Read a model JSON file.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open model JSON '{}': {e}", path.display())))?;
    let model: ModelFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid model JSON: {e}")))?;
    Ok(model)
}
