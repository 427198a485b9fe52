//! K-Type training binary.
//!
//! Runs the full pipeline: dataset preparation, k-means diagnostic, grid
//! search over the candidate classifiers, held-out evaluation and verified
//! artifact persistence. Exits nonzero if any required stage fails.

use agritype::config::TrainConfig;
use agritype::pipeline::train;
use std::path::PathBuf;
use tracing::{error, info};

fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt::init();

    let config = match load_train_config() {
        Ok(config) => config,
        Err(message) => {
            error!("{message}");
            eprintln!("Usage: train <dataset.csv> <artifact.bin> [report.json]");
            eprintln!(
                "Paths may also come from AGRITYPE_DATASET / AGRITYPE_ARTIFACT / AGRITYPE_REPORT; \
                 AGRITYPE_SEED overrides the default seed."
            );
            std::process::exit(2);
        }
    };

    info!(
        dataset = %config.dataset_path.display(),
        artifact = %config.artifact_path.display(),
        seed = config.seed,
        "Starting training run"
    );

    match train(&config) {
        Ok(outcome) => {
            info!(
                best = %outcome.report.best_candidate,
                cv_accuracy = outcome.report.cv_accuracy,
                test_accuracy = outcome.report.test_accuracy,
                classes = outcome.report.classes.len(),
                "Training complete"
            );
        }
        Err(err) => {
            error!(error = %err, "Training failed");
            std::process::exit(1);
        }
    }
}

/// Load the run configuration from CLI args with environment fallback.
///
/// Checks (in order) for each path:
/// 1. Positional CLI argument
/// 2. `AGRITYPE_*` environment variable
fn load_train_config() -> Result<TrainConfig, String> {
    let mut args = std::env::args().skip(1);

    let dataset_path: PathBuf = args
        .next()
        .or_else(|| std::env::var("AGRITYPE_DATASET").ok())
        .map(PathBuf::from)
        .ok_or_else(|| "no dataset path given".to_string())?;

    let artifact_path: PathBuf = args
        .next()
        .or_else(|| std::env::var("AGRITYPE_ARTIFACT").ok())
        .map(PathBuf::from)
        .ok_or_else(|| "no artifact path given".to_string())?;

    let mut config = TrainConfig::new(dataset_path, artifact_path);

    if let Some(report) = args
        .next()
        .or_else(|| std::env::var("AGRITYPE_REPORT").ok())
    {
        config = config.with_report_path(report);
    }

    if let Ok(seed) = std::env::var("AGRITYPE_SEED") {
        let seed: u64 = seed
            .parse()
            .map_err(|_| format!("AGRITYPE_SEED is not a valid integer: {seed}"))?;
        config = config.with_seed(seed);
    }

    Ok(config)
}
