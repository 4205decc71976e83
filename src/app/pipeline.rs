//! Shared fit and score workflows.
//!
//! ingest -> multi-start EM -> model -> scores -> optional exports
//!
//! The CLI handlers only print what these return.

use std::path::Path;

use nalgebra::DMatrix;
use tracing::info;

use crate::domain::FitConfig;
use crate::error::AppError;
use crate::fit::{RestartSummary, fit_restarts, restart_seeds};
use crate::io::{IngestedPoints, load_points, mixture_from_model_file, read_model_json};
use crate::models::{GaussianMixture, hard_labels};
use crate::report::{ScoreReport, label_counts};

/// All computed outputs of a single `gmm fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedPoints,
    pub summary: RestartSummary,
    pub model: GaussianMixture,
    pub labels: Vec<usize>,
    pub score: ScoreReport,
}

/// All computed outputs of a single `gmm score` run.
#[derive(Debug, Clone)]
pub struct ScoreOutput {
    pub ingest: IngestedPoints,
    pub model: GaussianMixture,
    pub responsibilities: DMatrix<f64>,
    pub score: ScoreReport,
}

/// Execute the full fitting pipeline, including any exports named in `config`.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    if config.restarts == 0 {
        return Err(AppError::new(2, "--restarts must be > 0."));
    }

    let ingest = load_points(&config.input, config.has_header)?;
    let points = &ingest.points;
    info!(
        n = ingest.stats.n_points,
        dim = ingest.stats.dim,
        k = config.components,
        restarts = config.restarts,
        "fitting"
    );

    let seeds = restart_seeds(config.seed, config.restarts);
    let summary = fit_restarts(points, config.components, &seeds, &config.em)?;

    let best = &summary.best;
    let model = GaussianMixture::from_fit(best.means.clone(), best.covariances.clone(), &best.fit);
    let labels = hard_labels(&best.fit.responsibilities);
    let score = ScoreReport {
        n_points: points.ncols(),
        log_likelihood: best.fit.log_likelihood,
        bic: model.bic(points)?,
        aic: model.aic(points)?,
        counts: label_counts(&labels, model.components()),
    };

    if let Some(path) = &config.export_model {
        crate::io::write_model_json(path, &model, &best.fit)?;
    }
    if let Some(path) = &config.export_responsibilities {
        crate::io::write_responsibilities_csv(path, &best.fit.responsibilities)?;
    }

    Ok(RunOutput {
        ingest,
        summary,
        model,
        labels,
        score,
    })
}

/// Score points against a saved model.
pub fn run_score(model_path: &Path, input: &Path, has_header: bool) -> Result<ScoreOutput, AppError> {
    let file = read_model_json(model_path)?;
    let model = mixture_from_model_file(&file)?;
    let ingest = load_points(input, has_header)?;
    let points = &ingest.points;

    let responsibilities = model.responsibilities(points)?;
    let labels = hard_labels(&responsibilities);
    let score = ScoreReport {
        n_points: points.ncols(),
        log_likelihood: model.log_likelihood(points)?,
        bic: model.bic(points)?,
        aic: model.aic(points)?,
        counts: label_counts(&labels, model.components()),
    };

    Ok(ScoreOutput {
        ingest,
        model,
        responsibilities,
        score,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::data::{SampleSpec, generate_clusters};
    use crate::domain::{EmConfig, EmptyComponentPolicy};
    use crate::io::write_points_csv;

    fn write_sample(dir: &Path) -> PathBuf {
        let spec = SampleSpec {
            centers: vec![vec![0.0, 0.0, 0.0], vec![10.0, 10.0, 10.0]],
            count_per_cluster: 50,
            spread: 0.2,
            seed: 11,
        };
        let data = generate_clusters(&spec).unwrap();
        let path = dir.join("points.csv");
        write_points_csv(&path, &data.points).unwrap();
        path
    }

    fn config(input: PathBuf, dir: &Path) -> FitConfig {
        FitConfig {
            input,
            has_header: true,
            components: 2,
            seed: 3,
            restarts: 3,
            em: EmConfig::default().with_empty_policy(EmptyComponentPolicy::Split),
            export_model: Some(dir.join("model.json")),
            export_responsibilities: Some(dir.join("resp.csv")),
        }
    }

    #[test]
    fn fit_then_score_agree_on_training_points() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path());
        let cfg = config(input.clone(), dir.path());

        let run = run_fit(&cfg).unwrap();
        assert_eq!(run.score.counts.iter().sum::<usize>(), 100);
        assert_eq!(run.score.counts, vec![50, 50]);
        assert!(dir.path().join("resp.csv").exists());

        let scored = run_score(&dir.path().join("model.json"), &input, true).unwrap();
        let tol = 1e-6 * run.score.log_likelihood.abs().max(1.0);
        assert!((scored.score.log_likelihood - run.score.log_likelihood).abs() < tol);
        assert_eq!(hard_labels(&scored.responsibilities), run.labels);
    }

    #[test]
    fn zero_restarts_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path());
        let mut cfg = config(input, dir.path());
        cfg.restarts = 0;
        assert_eq!(run_fit(&cfg).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn too_many_components_is_insufficient_data() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_sample(dir.path());
        let mut cfg = config(input, dir.path());
        cfg.components = 500;
        assert_eq!(run_fit(&cfg).unwrap_err().exit_code(), 3);
    }
}
