//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use std::path::Path;

use crate::domain::{DatasetStats, FitConfig};
use crate::fit::RestartSummary;
use crate::models::GaussianMixture;

/// Scalar scores of a model against a point set.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    pub n_points: usize,
    pub log_likelihood: f64,
    pub bic: f64,
    pub aic: f64,
    /// Number of points assigned to each component by hard labelling.
    pub counts: Vec<usize>,
}

impl ScoreReport {
    pub fn mean_log_likelihood(&self) -> f64 {
        self.log_likelihood / self.n_points.max(1) as f64
    }
}

/// Points per component from hard labels.
pub fn label_counts(labels: &[usize], components: usize) -> Vec<usize> {
    let mut counts = vec![0; components];
    for &l in labels {
        if let Some(c) = counts.get_mut(l) {
            *c += 1;
        }
    }
    counts
}

/// Format the full run summary (dataset stats + EM diagnostics + fitted components).
pub fn format_fit_summary(
    stats: &DatasetStats,
    skipped_rows: usize,
    summary: &RestartSummary,
    model: &GaussianMixture,
    score: &ScoreReport,
    config: &FitConfig,
) -> String {
    let mut out = String::new();
    let fit = &summary.best.fit;

    out.push_str("=== gmm - Gaussian Mixture Fit (EM) ===\n");
    out.push_str(&format!("Input: {}\n", config.input.display()));
    out.push_str(&format_stats(stats));
    if skipped_rows > 0 {
        out.push_str(&format!("Skipped rows: {skipped_rows}\n"));
    }

    out.push_str("\nEM diagnostics:\n");
    out.push_str(&format!(
        "- components={} restarts={} failed={} best_seed={}\n",
        model.components(),
        summary.attempted,
        summary.failures.len(),
        summary.best.seed
    ));
    out.push_str(&format!(
        "- iterations={} converged={} reseeds={}\n",
        fit.iterations, fit.converged, fit.reseeds
    ));
    out.push_str(&format!(
        "- tol={:e} reg_covar={:e} max_iter={} empty_policy={:?}\n",
        config.em.tolerance, config.em.reg_covar, config.em.max_iter, config.em.empty_policy
    ));
    out.push_str(&format_scores(score));
    for (seed, err) in &summary.failures {
        out.push_str(&format!("  (seed {seed} failed) {err}\n"));
    }

    out.push_str("\nComponents:\n");
    out.push_str(&format_components(model, &score.counts));

    out
}

/// Format the result of scoring a saved model against a point set.
pub fn format_score_summary(model_path: &Path, stats: &DatasetStats, model: &GaussianMixture, score: &ScoreReport) -> String {
    let mut out = String::new();
    out.push_str("=== gmm - Score ===\n");
    out.push_str(&format!("Model: {} (K={}, d={})\n", model_path.display(), model.components(), model.dim()));
    out.push_str(&format_stats(stats));
    out.push_str(&format_scores(score));
    out.push_str("\nComponents:\n");
    out.push_str(&format_components(model, &score.counts));
    out
}

fn format_stats(stats: &DatasetStats) -> String {
    let bounds: Vec<String> = stats
        .min
        .iter()
        .zip(&stats.max)
        .map(|(lo, hi)| format!("[{lo:.3}, {hi:.3}]"))
        .collect();
    format!("Points: n={} | d={} | bounds={}\n", stats.n_points, stats.dim, bounds.join(" "))
}

fn format_scores(score: &ScoreReport) -> String {
    format!(
        "- logL={:.6} (per point {:.6}) BIC={:.3} AIC={:.3}\n",
        score.log_likelihood,
        score.mean_log_likelihood(),
        score.bic,
        score.aic
    )
}

fn format_components(model: &GaussianMixture, counts: &[usize]) -> String {
    let mut out = String::new();
    out.push_str(format!("{:<5} {:>10} {:>8}  {}\n", "comp", "prior", "points", "mean / cov diag").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<5} {:-<10} {:-<8}  {:-<15}\n", "", "", "", "").trim_end());
    out.push('\n');

    for (c, (mean, cov)) in model.means.iter().zip(&model.covariances).enumerate() {
        let diag: Vec<f64> = cov.diagonal().iter().copied().collect();
        let mean: Vec<f64> = mean.iter().copied().collect();
        out.push_str(&format!(
            "{:<5} {:>10.6} {:>8}  {} / {}\n",
            c,
            model.priors[c],
            counts.get(c).copied().unwrap_or(0),
            fmt_vec(&mean),
            fmt_vec(&diag)
        ));
    }
    out
}

fn fmt_vec(v: &[f64]) -> String {
    let parts: Vec<String> = v.iter().map(|x| format!("{x:.4}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn label_counts_ignore_out_of_range() {
        assert_eq!(label_counts(&[0, 1, 1, 5], 2), vec![1, 2]);
    }

    #[test]
    fn score_summary_lists_every_component() {
        let model = GaussianMixture::new(
            vec![DVector::from_row_slice(&[0.0, 1.0]), DVector::from_row_slice(&[5.0, 5.0])],
            vec![DMatrix::identity(2, 2), DMatrix::identity(2, 2) * 2.0],
            DVector::from_row_slice(&[0.25, 0.75]),
        )
        .unwrap();
        let stats = DatasetStats {
            n_points: 4,
            dim: 2,
            min: vec![0.0, 0.0],
            max: vec![5.0, 5.0],
        };
        let score = ScoreReport {
            n_points: 4,
            log_likelihood: -8.0,
            bic: 20.0,
            aic: 18.0,
            counts: vec![1, 3],
        };

        let text = format_score_summary(Path::new("m.json"), &stats, &model, &score);
        assert!(text.contains("K=2, d=2"));
        assert!(text.contains("per point -2.000000"));
        assert!(text.contains("[5.0000, 5.0000] / [2.0000, 2.0000]"));
        assert_eq!(text.lines().filter(|l| l.contains(" / [")).count(), 2);
    }
}
