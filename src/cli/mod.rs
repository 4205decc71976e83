//! Command-line parsing for the `gmm` tool.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! fitting code. Numeric EM knobs can also come from the environment (or a
//! `.env` file), with flags taking precedence.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::domain::EmptyComponentPolicy;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "gmm", version, about = "Gaussian mixture fitting with expectation-maximization")]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit a mixture to points from a CSV file, print diagnostics, and optionally export.
    Fit(FitArgs),
    /// Generate synthetic Gaussian clusters as CSV.
    Sample(SampleArgs),
    /// Score points against a previously exported model JSON.
    Score(ScoreArgs),
}

/// Options for fitting.
#[derive(Debug, Parser, Clone)]
pub struct FitArgs {
    /// CSV file with one point per row.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// The CSV has no header row.
    #[arg(long)]
    pub no_header: bool,

    /// Number of mixture components.
    #[arg(short = 'k', long, default_value_t = 2)]
    pub components: usize,

    /// Base seed for the initial guesses.
    #[arg(long, env = "GMM_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Independent initializations; the best final log-likelihood wins.
    #[arg(long, default_value_t = 1)]
    pub restarts: usize,

    /// Maximum EM iterations per start.
    #[arg(long, env = "GMM_MAX_ITER", default_value_t = 100)]
    pub max_iter: usize,

    /// Convergence threshold on the per-point log-likelihood gain.
    #[arg(long = "tol", env = "GMM_TOL", default_value_t = 1e-6)]
    pub tolerance: f64,

    /// Diagonal regularization, relative to the mean per-axis variance of the data.
    #[arg(long, env = "GMM_REG_COVAR", default_value_t = 1e-6)]
    pub reg_covar: f64,

    /// What to do when a component loses all its points.
    #[arg(long, value_enum, default_value_t = EmptyComponentPolicy::Fail)]
    pub empty_policy: EmptyComponentPolicy,

    /// Export the fitted model to JSON.
    #[arg(long = "export-model")]
    pub export_model: Option<PathBuf>,

    /// Export per-point responsibilities to CSV.
    #[arg(long = "export-resp")]
    pub export_responsibilities: Option<PathBuf>,
}

/// Options for synthetic data generation.
#[derive(Debug, Parser, Clone)]
pub struct SampleArgs {
    /// Cluster center as comma-separated coordinates; repeat for more clusters.
    #[arg(long = "center", value_name = "X,Y,...", required = true, allow_hyphen_values = true)]
    pub centers: Vec<String>,

    /// Points per cluster.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub count: usize,

    /// Standard deviation along every axis.
    #[arg(long, default_value_t = 1.0)]
    pub spread: f64,

    /// Random seed.
    #[arg(long, env = "GMM_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Output CSV path.
    #[arg(short, long, value_name = "CSV")]
    pub output: PathBuf,
}

/// Options for scoring a saved model.
#[derive(Debug, Parser, Clone)]
pub struct ScoreArgs {
    /// Model JSON produced by `gmm fit --export-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    /// CSV file with one point per row.
    #[arg(long, value_name = "CSV")]
    pub input: PathBuf,

    /// The CSV has no header row.
    #[arg(long)]
    pub no_header: bool,

    /// Export per-point responsibilities to CSV.
    #[arg(long = "export-resp")]
    pub export_responsibilities: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fit_flags() {
        let cli = Cli::try_parse_from([
            "gmm",
            "-v",
            "fit",
            "--input",
            "pts.csv",
            "-k",
            "3",
            "--tol",
            "1e-8",
            "--empty-policy",
            "split",
            "--export-model",
            "m.json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.components, 3);
        assert_eq!(args.tolerance, 1e-8);
        assert_eq!(args.empty_policy, EmptyComponentPolicy::Split);
        assert_eq!(args.export_model, Some(PathBuf::from("m.json")));
        assert!(!args.no_header);
    }

    #[test]
    fn sample_accepts_repeated_negative_centers() {
        let cli = Cli::try_parse_from([
            "gmm", "sample", "--center", "-1,-1", "--center", "4,4", "-o", "out.csv",
        ])
        .unwrap();
        let Command::Sample(args) = cli.command else {
            panic!("expected sample");
        };
        assert_eq!(args.centers, vec!["-1,-1", "4,4"]);
    }

    #[test]
    fn fit_requires_input() {
        assert!(Cli::try_parse_from(["gmm", "fit"]).is_err());
    }
}
