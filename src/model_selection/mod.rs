//! Model selection: train/test splitting, k-fold cross-validation and the
//! candidate grid search that picks the production classifier.

use crate::dataset::FeatureTable;
use crate::error::{AgritypeError, Result};
use crate::preprocessing::TablePreprocessor;
use crate::primitives::Matrix;
use crate::traits::Classifier;
use crate::tree::{GradientBoostingClassifier, RandomForestClassifier};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Splits `n_samples` row indices into shuffled train/test index sets.
///
/// # Errors
///
/// Returns an error if `test_fraction` is outside (0, 1) or either side
/// of the split would be empty.
pub fn train_test_split(
    n_samples: usize,
    test_fraction: f32,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>)> {
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(AgritypeError::InvalidHyperparameter {
            param: "test_fraction".to_string(),
            value: test_fraction.to_string(),
            constraint: "must be strictly between 0 and 1".to_string(),
        });
    }

    let n_test = ((n_samples as f32) * test_fraction).round() as usize;
    if n_test == 0 || n_test >= n_samples {
        return Err(AgritypeError::empty_input(
            "train/test split leaves an empty side",
        ));
    }

    let mut indices: Vec<usize> = (0..n_samples).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_indices = indices[..n_test].to_vec();
    let train_indices = indices[n_test..].to_vec();
    Ok((train_indices, test_indices))
}

/// K-Fold cross-validator with optional seeded shuffling.
#[derive(Debug, Clone)]
pub struct KFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl KFold {
    /// Creates a new K-Fold splitter with `n_splits` folds.
    #[must_use]
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: false,
            random_state: None,
        }
    }

    /// Sets the seed for reproducible shuffling (implies shuffle).
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self.shuffle = true;
        self
    }

    /// Generates `(train_indices, test_indices)` pairs, one per fold.
    ///
    /// Fold sizes differ by at most one; the remainder goes to the first
    /// folds.
    #[must_use]
    pub fn split(&self, n_samples: usize) -> Vec<(Vec<usize>, Vec<usize>)> {
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            if let Some(seed) = self.random_state {
                let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
                indices.shuffle(&mut rng);
            } else {
                let mut rng = rand::thread_rng();
                indices.shuffle(&mut rng);
            }
        }

        let fold_size = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;

        let mut result = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for i in 0..self.n_splits {
            let current = if i < remainder { fold_size + 1 } else { fold_size };
            let end = start + current;

            let test_indices = indices[start..end].to_vec();
            let mut train_indices = Vec::with_capacity(n_samples - current);
            train_indices.extend_from_slice(&indices[..start]);
            train_indices.extend_from_slice(&indices[end..]);

            result.push((train_indices, test_indices));
            start = end;
        }
        result
    }
}

/// Per-fold scores from cross-validation.
#[derive(Debug, Clone)]
pub struct CrossValidationResult {
    /// Accuracy on each held-out fold.
    pub scores: Vec<f32>,
}

impl CrossValidationResult {
    /// Mean score across folds.
    #[must_use]
    pub fn mean(&self) -> f32 {
        if self.scores.is_empty() {
            return 0.0;
        }
        self.scores.iter().sum::<f32>() / self.scores.len() as f32
    }

    /// Standard deviation of fold scores.
    #[must_use]
    pub fn std(&self) -> f32 {
        if self.scores.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance = self
            .scores
            .iter()
            .map(|&s| (s - mean).powi(2))
            .sum::<f32>()
            / self.scores.len() as f32;
        variance.sqrt()
    }
}

/// Cross-validates a classifier, training a fresh clone per fold.
///
/// # Errors
///
/// Returns an error if any fold fails to fit or score.
pub fn cross_validate<C>(
    model: &C,
    x: &Matrix<f32>,
    y: &[usize],
    cv: &KFold,
) -> Result<CrossValidationResult>
where
    C: Classifier + Clone,
{
    let splits = cv.split(x.n_rows());
    let mut scores = Vec::with_capacity(splits.len());

    for (train_idx, test_idx) in splits {
        let x_train = x.take_rows(&train_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let x_test = x.take_rows(&test_idx);
        let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();

        let mut fold_model = model.clone();
        fold_model.fit(&x_train, &y_train)?;
        scores.push(fold_model.score(&x_test, &y_test)?);
    }

    Ok(CrossValidationResult { scores })
}

/// Cross-validates a classifier over a raw feature table, fitting a fresh
/// [`TablePreprocessor`] on each fold's training rows.
///
/// Per-fold refitting keeps every fold's validation rows out of the scaler
/// statistics and encoder vocabularies that score them.
///
/// # Errors
///
/// Returns an error if any fold fails to preprocess, fit or score.
pub fn cross_validate_table<C>(
    model: &C,
    table: &FeatureTable,
    y: &[usize],
    cv: &KFold,
) -> Result<CrossValidationResult>
where
    C: Classifier + Clone,
{
    let splits = cv.split(table.n_rows());
    let mut scores = Vec::with_capacity(splits.len());

    for (train_idx, test_idx) in splits {
        let train_table = table.take_rows(&train_idx);
        let test_table = table.take_rows(&test_idx);
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();
        let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();

        let mut preprocessor = TablePreprocessor::new();
        let x_train = preprocessor.fit_transform(&train_table)?;
        let x_test = preprocessor.transform(&test_table)?;

        let mut fold_model = model.clone();
        fold_model.fit(&x_train, &y_train)?;
        scores.push(fold_model.score(&x_test, &y_test)?);
    }

    Ok(CrossValidationResult { scores })
}

/// Hyperparameter combination for one grid-search candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CandidateParams {
    /// Random forest: bagged trees with optional depth cap.
    Forest {
        n_estimators: usize,
        max_depth: Option<usize>,
    },
    /// Gradient boosting: shallow trees with shrinkage.
    Boosting {
        n_estimators: usize,
        learning_rate: f32,
        max_depth: usize,
    },
}

impl CandidateParams {
    /// Builds an unfitted model for these parameters.
    #[must_use]
    pub fn build(&self, seed: u64) -> CandidateModel {
        match *self {
            Self::Forest {
                n_estimators,
                max_depth,
            } => {
                let mut rf = RandomForestClassifier::new(n_estimators).with_random_state(seed);
                if let Some(depth) = max_depth {
                    rf = rf.with_max_depth(depth);
                }
                CandidateModel::Forest(rf)
            }
            Self::Boosting {
                n_estimators,
                learning_rate,
                max_depth,
            } => CandidateModel::Boosting(
                GradientBoostingClassifier::new()
                    .with_n_estimators(n_estimators)
                    .with_learning_rate(learning_rate)
                    .with_max_depth(max_depth),
            ),
        }
    }

    /// Ordering key for tie-breaking between equally scored candidates.
    ///
    /// Lower is preferred: fewer trees first, then smaller depth (uncapped
    /// depth counts as largest), then forests before boosters.
    #[must_use]
    pub fn complexity_key(&self) -> (usize, usize, u8) {
        match *self {
            Self::Forest {
                n_estimators,
                max_depth,
            } => (n_estimators, max_depth.unwrap_or(usize::MAX), 0),
            Self::Boosting {
                n_estimators,
                max_depth,
                ..
            } => (n_estimators, max_depth, 1),
        }
    }

    /// Human-readable description for logs and reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match *self {
            Self::Forest {
                n_estimators,
                max_depth,
            } => match max_depth {
                Some(d) => format!("random_forest(trees={n_estimators}, max_depth={d})"),
                None => format!("random_forest(trees={n_estimators}, max_depth=none)"),
            },
            Self::Boosting {
                n_estimators,
                learning_rate,
                max_depth,
            } => format!(
                "gradient_boosting(trees={n_estimators}, lr={learning_rate}, max_depth={max_depth})"
            ),
        }
    }
}

/// A fitted (or fittable) candidate classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CandidateModel {
    Forest(RandomForestClassifier),
    Boosting(GradientBoostingClassifier),
}

impl Classifier for CandidateModel {
    fn fit(&mut self, x: &Matrix<f32>, y: &[usize]) -> Result<()> {
        match self {
            Self::Forest(rf) => rf.fit(x, y),
            Self::Boosting(gb) => gb.fit(x, y),
        }
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vec<usize>> {
        match self {
            Self::Forest(rf) => rf.predict(x),
            Self::Boosting(gb) => gb.predict(x),
        }
    }
}

/// The fixed candidate grid evaluated on every training run.
#[must_use]
pub fn default_grid() -> Vec<CandidateParams> {
    let mut grid = Vec::new();
    for n_estimators in [100, 200] {
        for max_depth in [None, Some(15)] {
            grid.push(CandidateParams::Forest {
                n_estimators,
                max_depth,
            });
        }
    }
    for max_depth in [3, 5] {
        grid.push(CandidateParams::Boosting {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth,
        });
    }
    grid
}

/// Cross-validation outcome for one candidate.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateScore {
    pub params: CandidateParams,
    pub mean_score: f32,
    pub std_score: f32,
}

/// Result of a full grid search.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    /// Winning hyperparameters.
    pub best_params: CandidateParams,
    /// Winner refit on the full training set.
    pub best_model: CandidateModel,
    /// Preprocessor fit on the full training set, paired with `best_model`.
    pub preprocessor: TablePreprocessor,
    /// Winning mean cross-validation accuracy.
    pub best_score: f32,
    /// Scores for every candidate that completed cross-validation.
    pub candidates: Vec<CandidateScore>,
}

/// Cross-validates every candidate over the raw feature table and refits
/// the winner (preprocessor and classifier) on all of `(table, y)`.
///
/// Each fold fits its own preprocessor on the fold's training rows, so
/// candidate ranking never sees fold-validation rows in the fitted
/// statistics. A candidate that fails cross-validation is skipped with a
/// warning; the search only errors if every candidate fails. Ties on mean
/// score break deterministically toward the simpler candidate.
///
/// # Errors
///
/// Returns [`AgritypeError::NoViableCandidate`] if no candidate completes,
/// or a fit error if the winner cannot be refit.
pub fn grid_search(
    grid: &[CandidateParams],
    table: &FeatureTable,
    y: &[usize],
    cv: &KFold,
    seed: u64,
) -> Result<GridSearchResult> {
    let mut best: Option<(CandidateParams, f32)> = None;
    let mut candidates = Vec::with_capacity(grid.len());

    for params in grid {
        let model = params.build(seed);
        let result = match cross_validate_table(&model, table, y, cv) {
            Ok(result) => result,
            Err(err) => {
                warn!(candidate = %params.describe(), error = %err, "Candidate failed cross-validation, skipping");
                continue;
            }
        };

        let mean = result.mean();
        info!(
            candidate = %params.describe(),
            mean_accuracy = mean,
            std = result.std(),
            "Candidate scored"
        );
        candidates.push(CandidateScore {
            params: params.clone(),
            mean_score: mean,
            std_score: result.std(),
        });

        let replace = match &best {
            None => true,
            Some((best_params, best_score)) => {
                mean > *best_score
                    || (mean == *best_score
                        && params.complexity_key() < best_params.complexity_key())
            }
        };
        if replace {
            best = Some((params.clone(), mean));
        }
    }

    let (best_params, best_score) = best.ok_or(AgritypeError::NoViableCandidate {
        attempted: grid.len(),
    })?;

    let mut preprocessor = TablePreprocessor::new();
    let x = preprocessor.fit_transform(table)?;
    let mut best_model = best_params.build(seed);
    best_model.fit(&x, y)?;

    info!(
        winner = %best_params.describe(),
        mean_accuracy = best_score,
        "Grid search complete"
    );

    Ok(GridSearchResult {
        best_params,
        best_model,
        preprocessor,
        best_score,
        candidates,
    })
}
