//! Training run configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a full training run.
///
/// The defaults reproduce the reference run: seed 42, 80/20 split, 3-fold
/// cross-validation and a 7-cluster diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Path to the farm reference CSV.
    pub dataset_path: PathBuf,
    /// Destination for the serialized model artifact.
    pub artifact_path: PathBuf,
    /// Optional path for the JSON training report.
    pub report_path: Option<PathBuf>,
    /// Seed controlling the split, folds and bootstrap sampling.
    pub seed: u64,
    /// Fraction of rows held out for final evaluation.
    pub test_fraction: f32,
    /// Number of cross-validation folds.
    pub cv_folds: usize,
    /// Cluster count for the k-means diagnostic.
    pub n_clusters: usize,
}

impl TrainConfig {
    /// Creates a configuration with default knobs for the given paths.
    #[must_use]
    pub fn new(dataset_path: impl Into<PathBuf>, artifact_path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
            artifact_path: artifact_path.into(),
            report_path: None,
            seed: 42,
            test_fraction: 0.2,
            cv_folds: 3,
            n_clusters: 7,
        }
    }

    /// Sets the path for the JSON training report.
    #[must_use]
    pub fn with_report_path(mut self, report_path: impl Into<PathBuf>) -> Self {
        self.report_path = Some(report_path.into());
        self
    }

    /// Sets the random seed.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}
