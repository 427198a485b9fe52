//! End-to-end training pipeline and the serialized model artifact.
//!
//! [`train`] wires the stages together: dataset preparation, the k-means
//! structure diagnostic, the seeded train/test split, the candidate grid
//! search, held-out evaluation and verified artifact persistence.

use crate::cluster::{ContingencyTable, KMeans};
use crate::config::TrainConfig;
use crate::dataset::{FarmDataset, FeatureTable};
use crate::error::{AgritypeError, Result};
use crate::metrics::ClassificationReport;
use crate::model_selection::{
    default_grid, grid_search, train_test_split, CandidateModel, CandidateScore, KFold,
};
use crate::preprocessing::{StandardScaler, TablePreprocessor};
use crate::traits::{Classifier, Transformer, UnsupervisedEstimator};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

/// Artifact format version; bumped on incompatible layout changes.
pub const ARTIFACT_VERSION: u32 = 1;

/// The deployable model artifact: fitted preprocessor, winning classifier
/// and the class vocabulary, serialized as one bincode blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KTypeModel {
    version: u32,
    preprocessor: TablePreprocessor,
    classifier: CandidateModel,
    classes: Vec<String>,
}

impl KTypeModel {
    /// Assembles an artifact from fitted components.
    #[must_use]
    pub fn new(
        preprocessor: TablePreprocessor,
        classifier: CandidateModel,
        classes: Vec<String>,
    ) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            preprocessor,
            classifier,
            classes,
        }
    }

    /// Returns the K-Type vocabulary the model predicts over.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Predicts K-Type names for each row of a feature table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table doesn't match the training schema.
    pub fn predict(&self, table: &FeatureTable) -> Result<Vec<String>> {
        let x = self.preprocessor.transform(table)?;
        let indices = self.classifier.predict(&x)?;
        indices
            .into_iter()
            .map(|idx| {
                self.classes.get(idx).cloned().ok_or_else(|| {
                    AgritypeError::ArtifactCheck {
                        message: format!("predicted class index {idx} outside vocabulary"),
                    }
                })
            })
            .collect()
    }

    /// Loads and validates an artifact from disk.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, corrupt bytes, or a version the
    /// running binary doesn't understand.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = fs::read(path.as_ref())?;
        let model: Self = bincode::deserialize(&bytes)?;
        if model.version != ARTIFACT_VERSION {
            return Err(AgritypeError::ArtifactCheck {
                message: format!(
                    "artifact version {} does not match expected {ARTIFACT_VERSION}",
                    model.version
                ),
            });
        }
        Ok(model)
    }

    /// Saves the artifact with a reload-and-predict sanity check.
    ///
    /// Serializes to a temp file next to the destination, reloads it,
    /// predicts `probe` with both copies, and only renames over `path`
    /// when the predictions agree. A failed check leaves any previous
    /// artifact at `path` untouched.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if the reloaded copy disagrees
    /// with the in-memory model.
    pub fn save_verified<P: AsRef<Path>>(&self, path: P, probe: &FeatureTable) -> Result<()> {
        let path = path.as_ref();
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());

        let mut tmp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };
        let bytes = bincode::serialize(self)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;

        let reloaded = Self::load(tmp.path())?;
        let expected = self.predict(probe)?;
        let actual = reloaded.predict(probe)?;
        if expected != actual {
            return Err(AgritypeError::ArtifactCheck {
                message: format!(
                    "reloaded artifact predicts {actual:?}, in-memory model predicts {expected:?}"
                ),
            });
        }

        tmp.persist(path)
            .map_err(|e| AgritypeError::Io(e.error))?;
        Ok(())
    }
}

/// Summary of one training run, exportable as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    /// Rows retained after filtering.
    pub n_rows: usize,
    /// Rows dropped for a missing label.
    pub dropped_unlabeled: usize,
    /// Rows dropped by the rare-label filter.
    pub dropped_rare_rows: usize,
    /// K-Types dropped by the rare-label filter.
    pub dropped_rare_classes: Vec<String>,
    /// Retained class vocabulary.
    pub classes: Vec<String>,
    /// Sample-weighted mean cluster purity from the k-means diagnostic,
    /// absent if the diagnostic was skipped.
    pub cluster_mean_purity: Option<f32>,
    /// Cross-validation scores for every completed candidate.
    pub candidates: Vec<CandidateScore>,
    /// Description of the winning candidate.
    pub best_candidate: String,
    /// Winning mean cross-validation accuracy.
    pub cv_accuracy: f32,
    /// Accuracy on the held-out test set.
    pub test_accuracy: f32,
    /// Per-class test-set metrics.
    pub classification: ClassificationReport,
}

/// Result of a training run: the fitted artifact and its report.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model: KTypeModel,
    pub report: TrainReport,
}

/// Clusters the standardized numeric features and cross-tabulates the
/// assignments against labels. Purely informational.
fn cluster_diagnostic(dataset: &FarmDataset, config: &TrainConfig) -> Option<f32> {
    let run = || -> Result<f32> {
        let mut scaler = StandardScaler::new();
        let standardized = scaler.fit_transform(dataset.features.numeric())?;

        let mut kmeans = KMeans::new(config.n_clusters).with_random_state(config.seed);
        kmeans.fit(&standardized)?;
        let assignments = kmeans.predict(&standardized)?;

        let table = ContingencyTable::compute(
            &assignments,
            &dataset.labels,
            config.n_clusters,
            &dataset.classes,
        )?;
        info!(
            inertia = kmeans.inertia(),
            iterations = kmeans.n_iter(),
            "K-means diagnostic\n{table}"
        );
        Ok(table.mean_purity())
    };

    match run() {
        Ok(purity) => {
            info!(mean_purity = purity, "Cluster/K-Type agreement");
            Some(purity)
        }
        Err(err) => {
            warn!(error = %err, "Cluster diagnostic skipped");
            None
        }
    }
}

/// Runs the full training pipeline and persists the artifact.
///
/// # Errors
///
/// Returns an error if any required stage fails: dataset loading, the
/// split, the grid search (all candidates failing), evaluation, or the
/// verified save. The cluster diagnostic is optional and only warns.
pub fn train(config: &TrainConfig) -> Result<TrainOutcome> {
    info!(path = %config.dataset_path.display(), "Loading dataset");
    let dataset = FarmDataset::from_csv_path(&config.dataset_path)?;

    let cluster_mean_purity = cluster_diagnostic(&dataset, config);

    let (train_idx, test_idx) =
        train_test_split(dataset.n_rows(), config.test_fraction, config.seed)?;
    info!(
        train_rows = train_idx.len(),
        test_rows = test_idx.len(),
        seed = config.seed,
        "Split dataset"
    );

    let train_table = dataset.features.take_rows(&train_idx);
    let test_table = dataset.features.take_rows(&test_idx);
    let y_train: Vec<usize> = train_idx.iter().map(|&i| dataset.labels[i]).collect();
    let y_test: Vec<usize> = test_idx.iter().map(|&i| dataset.labels[i]).collect();

    // Each CV fold fits its own preprocessor inside grid_search; the
    // returned one is fit on the whole training split for the artifact.
    let kfold = KFold::new(config.cv_folds).with_random_state(config.seed);
    let search = grid_search(&default_grid(), &train_table, &y_train, &kfold, config.seed)?;

    let x_test = search.preprocessor.transform(&test_table)?;
    let y_pred = search.best_model.predict(&x_test)?;
    let test_accuracy = crate::metrics::accuracy(&y_pred, &y_test);
    let classification = ClassificationReport::compute(&y_pred, &y_test, &dataset.classes);
    info!(
        test_accuracy,
        winner = %search.best_params.describe(),
        "Held-out evaluation\n{classification}"
    );

    let model = KTypeModel::new(search.preprocessor, search.best_model, dataset.classes.clone());

    // Sanity-check the artifact against a real held-out row before the
    // new file replaces any previous one.
    let probe = test_table.take_rows(&[0]);
    model.save_verified(&config.artifact_path, &probe)?;
    info!(path = %config.artifact_path.display(), "Artifact saved");

    let report = TrainReport {
        n_rows: dataset.n_rows(),
        dropped_unlabeled: dataset.dropped_unlabeled,
        dropped_rare_rows: dataset.dropped_rare_rows,
        dropped_rare_classes: dataset.dropped_rare_classes.clone(),
        classes: dataset.classes.clone(),
        cluster_mean_purity,
        candidates: search.candidates,
        best_candidate: search.best_params.describe(),
        cv_accuracy: search.best_score,
        test_accuracy,
        classification,
    };

    if let Some(report_path) = &config.report_path {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| AgritypeError::Serialization(e.to_string()))?;
        fs::write(report_path, json)?;
        info!(path = %report_path.display(), "Report written");
    }

    Ok(TrainOutcome { model, report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::Matrix;

    fn fitted_model() -> (KTypeModel, FeatureTable) {
        let n = 12;
        let mut numeric = Vec::new();
        let mut regions = Vec::new();
        let mut filieres = Vec::new();
        let mut labels = Vec::new();
        for i in 0..n {
            let big = i >= n / 2;
            let base = if big { 200.0 } else { 40.0 };
            numeric.extend_from_slice(&[
                base + i as f32,
                2.0,
                base / 2.0,
                base / 4.0,
                base / 3.0,
                10.0,
                5.0,
                8.0,
            ]);
            regions.push(if big { "Beauce" } else { "Bretagne" }.to_string());
            filieres.push("Bovins Lait".to_string());
            labels.push(usize::from(big));
        }
        let table = FeatureTable::new(
            Matrix::from_vec(n, 8, numeric).unwrap(),
            vec![regions, filieres],
            crate::dataset::NUMERIC_COLUMNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            crate::dataset::CATEGORICAL_COLUMNS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
        )
        .unwrap();

        let mut preprocessor = TablePreprocessor::new();
        let x = preprocessor.fit_transform(&table).unwrap();
        let mut classifier = CandidateModel::Forest(
            crate::tree::RandomForestClassifier::new(5).with_random_state(42),
        );
        classifier.fit(&x, &labels).unwrap();

        let model = KTypeModel::new(
            preprocessor,
            classifier,
            vec!["Petit".to_string(), "Grand".to_string()],
        );
        (model, table)
    }

    #[test]
    fn test_predict_maps_to_class_names() {
        let (model, table) = fitted_model();
        let predictions = model.predict(&table).expect("predict");
        assert_eq!(predictions.len(), 12);
        assert!(predictions
            .iter()
            .all(|p| p == "Petit" || p == "Grand"));
    }

    #[test]
    fn test_save_verified_and_load() {
        let (model, table) = fitted_model();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.bin");
        let probe = table.take_rows(&[0]);

        model.save_verified(&path, &probe).expect("save");
        let loaded = KTypeModel::load(&path).expect("load");
        assert_eq!(
            loaded.predict(&table).unwrap(),
            model.predict(&table).unwrap()
        );
    }

    #[test]
    fn test_save_verified_overwrites_previous() {
        let (model, table) = fitted_model();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.bin");
        let probe = table.take_rows(&[0]);

        model.save_verified(&path, &probe).expect("first save");
        model.save_verified(&path, &probe).expect("second save");
        assert!(KTypeModel::load(&path).is_ok());
    }

    #[test]
    fn test_failed_save_preserves_existing_artifact() {
        let (model, table) = fitted_model();
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.bin");
        let probe = table.take_rows(&[0]);

        model.save_verified(&path, &probe).expect("first save");
        let expected = model.predict(&table).unwrap();

        // A bad version makes the reload check inside save_verified fail
        // before the temp file replaces the destination.
        let mut broken = model.clone();
        broken.version = 999;
        assert!(broken.save_verified(&path, &probe).is_err());

        let survivor = KTypeModel::load(&path).expect("previous artifact intact");
        assert_eq!(survivor.predict(&table).unwrap(), expected);
    }

    #[test]
    fn test_load_rejects_wrong_version() {
        let (mut model, table) = fitted_model();
        model.version = 999;
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.bin");
        fs::write(&path, bincode::serialize(&model).unwrap()).unwrap();
        let err = KTypeModel::load(&path).unwrap_err();
        assert!(matches!(err, AgritypeError::ArtifactCheck { .. }));
        let _ = table;
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("model.bin");
        fs::write(&path, b"not a model").unwrap();
        assert!(KTypeModel::load(&path).is_err());
    }
}
