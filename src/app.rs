//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - installs the log subscriber
//! - dispatches to fit / sample / score

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, FitArgs, SampleArgs, ScoreArgs};
use crate::data::{SampleSpec, generate_clusters, parse_center};
use crate::domain::{EmConfig, FitConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `gmm` binary.
pub fn run() -> Result<(), AppError> {
    // A missing .env is the normal case.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Sample(args) => handle_sample(args),
        Command::Score(args) => handle_score(args),
    }
}

/// Logs go to stderr so stdout stays clean for reports.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "gmm_fit=info",
        1 => "gmm_fit=debug",
        _ => "gmm_fit=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // Ignore the error if a subscriber is already installed (tests, embedding).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;

    println!(
        "{}",
        crate::report::format_fit_summary(
            &run.ingest.stats,
            run.ingest.row_errors.len(),
            &run.summary,
            &run.model,
            &run.score,
            &config,
        )
    );
    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let centers = args
        .centers
        .iter()
        .map(|c| parse_center(c))
        .collect::<Result<Vec<_>, _>>()?;
    let spec = SampleSpec {
        centers,
        count_per_cluster: args.count,
        spread: args.spread,
        seed: args.seed,
    };
    let data = generate_clusters(&spec)?;
    crate::io::write_points_csv(&args.output, &data.points)?;
    info!(
        path = %args.output.display(),
        points = data.points.ncols(),
        dim = data.points.nrows(),
        "wrote sample"
    );
    Ok(())
}

fn handle_score(args: ScoreArgs) -> Result<(), AppError> {
    let run = pipeline::run_score(&args.model, &args.input, !args.no_header)?;
    if let Some(path) = &args.export_responsibilities {
        crate::io::write_responsibilities_csv(path, &run.responsibilities)?;
    }
    println!(
        "{}",
        crate::report::format_score_summary(&args.model, &run.ingest.stats, &run.model, &run.score)
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    let em = EmConfig::default()
        .with_max_iter(args.max_iter)
        .with_tolerance(args.tolerance)
        .with_reg_covar(args.reg_covar)
        .with_empty_policy(args.empty_policy);
    FitConfig {
        input: args.input.clone(),
        has_header: !args.no_header,
        components: args.components,
        seed: args.seed,
        restarts: args.restarts,
        em,
        export_model: args.export_model.clone(),
        export_responsibilities: args.export_responsibilities.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EmptyComponentPolicy;

    #[test]
    fn flags_flow_into_fit_config() {
        let cli = Cli::try_parse_from([
            "gmm", "fit", "--input", "p.csv", "--no-header", "-k", "4", "--max-iter", "7",
            "--reg-covar", "1e-4", "--empty-policy", "split", "--restarts", "3",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = fit_config_from_args(&args);
        assert!(!config.has_header);
        assert_eq!(config.components, 4);
        assert_eq!(config.restarts, 3);
        assert_eq!(config.em.max_iter, 7);
        assert_eq!(config.em.reg_covar, 1e-4);
        assert_eq!(config.em.empty_policy, EmptyComponentPolicy::Split);
        assert!(config.em.validate().is_ok());
    }
}
