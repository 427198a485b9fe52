//! Gradient boosting classifier with shallow CART weak learners.
//!
//! The core booster is binary: log-odds initialization, sigmoid link and
//! residual-sign trees. Multiclass problems are handled one-vs-rest with
//! one booster per class and argmax over the per-class raw scores.

use super::DecisionTreeClassifier;
use crate::error::{AgritypeError, Result};
use crate::primitives::Matrix;
use crate::traits::Classifier;
use serde::{Deserialize, Serialize};

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Binary booster for a single one-vs-rest problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryBooster {
    init_prediction: f32,
    estimators: Vec<DecisionTreeClassifier>,
}

impl BinaryBooster {
    /// `y` holds 0/1 membership labels for this class.
    fn fit(
        x: &Matrix<f32>,
        y: &[f32],
        n_estimators: usize,
        learning_rate: f32,
        max_depth: usize,
    ) -> Result<Self> {
        let n_samples = y.len();

        // Log-odds of the positive rate, clamped for degenerate classes.
        let positive = y.iter().filter(|&&v| v == 1.0).count();
        let p = positive as f32 / n_samples as f32;
        let init_prediction = if p > 0.0 && p < 1.0 {
            (p / (1.0 - p)).ln()
        } else if p >= 1.0 {
            5.0
        } else {
            -5.0
        };

        let mut raw_predictions = vec![init_prediction; n_samples];
        let mut estimators = Vec::with_capacity(n_estimators);

        for _ in 0..n_estimators {
            // Pseudo-residuals for log-loss: y - sigmoid(raw).
            let residual_labels: Vec<usize> = raw_predictions
                .iter()
                .zip(y.iter())
                .map(|(&raw, &yi)| usize::from(yi - sigmoid(raw) >= 0.0))
                .collect();

            let mut tree = DecisionTreeClassifier::new().with_max_depth(max_depth);
            tree.fit(x, &residual_labels)?;

            let tree_preds = tree.predict(x)?;
            for (raw, &pred) in raw_predictions.iter_mut().zip(tree_preds.iter()) {
                let direction = if pred == 0 { -1.0 } else { 1.0 };
                *raw += learning_rate * direction;
            }
            estimators.push(tree);
        }

        Ok(Self {
            init_prediction,
            estimators,
        })
    }

    /// Raw (log-odds) scores for each row.
    fn decision_function(&self, x: &Matrix<f32>, learning_rate: f32) -> Result<Vec<f32>> {
        let mut raw = vec![self.init_prediction; x.n_rows()];
        for tree in &self.estimators {
            let preds = tree.predict(x)?;
            for (r, &pred) in raw.iter_mut().zip(preds.iter()) {
                let direction = if pred == 0 { -1.0 } else { 1.0 };
                *r += learning_rate * direction;
            }
        }
        Ok(raw)
    }
}

/// Gradient boosting classifier.
///
/// Deterministic for a given dataset: trees are CART with deterministic
/// splits and no subsampling is used, so no seed is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    n_estimators: usize,
    learning_rate: f32,
    max_depth: usize,
    n_classes: usize,
    boosters: Vec<BinaryBooster>,
}

impl GradientBoostingClassifier {
    /// Creates a new booster with defaults: 100 trees, learning rate 0.1,
    /// depth 3.
    #[must_use]
    pub fn new() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            n_classes: 0,
            boosters: Vec::new(),
        }
    }

    /// Sets the number of boosting iterations per class.
    #[must_use]
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    /// Sets the shrinkage parameter.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the maximum depth of each weak learner.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the configured number of boosting iterations per class.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Returns the learning rate.
    #[must_use]
    pub fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    /// Returns the weak-learner depth.
    #[must_use]
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Per-class membership probabilities via sigmoid of the raw scores,
    /// normalized to sum to one per row.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted.
    pub fn predict_proba(&self, x: &Matrix<f32>) -> Result<Vec<Vec<f32>>> {
        if self.boosters.is_empty() {
            return Err(AgritypeError::not_fitted("GradientBoostingClassifier"));
        }

        let n_samples = x.n_rows();
        let mut scores = vec![vec![0.0f32; self.n_classes]; n_samples];
        for (class, booster) in self.boosters.iter().enumerate() {
            let raw = booster.decision_function(x, self.learning_rate)?;
            for (row, &r) in raw.iter().enumerate() {
                scores[row][class] = sigmoid(r);
            }
        }

        for row in &mut scores {
            let total: f32 = row.iter().sum();
            if total > 0.0 {
                for p in row.iter_mut() {
                    *p /= total;
                }
            }
        }
        Ok(scores)
    }
}

impl Default for GradientBoostingClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for GradientBoostingClassifier {
    fn fit(&mut self, x: &Matrix<f32>, y: &[usize]) -> Result<()> {
        if x.n_rows() != y.len() {
            return Err(AgritypeError::dimension_mismatch(
                "samples",
                x.n_rows(),
                y.len(),
            ));
        }
        if y.is_empty() {
            return Err(AgritypeError::empty_input("GradientBoostingClassifier fit"));
        }
        if self.learning_rate <= 0.0 {
            return Err(AgritypeError::InvalidHyperparameter {
                param: "learning_rate".to_string(),
                value: self.learning_rate.to_string(),
                constraint: "must be positive".to_string(),
            });
        }

        // Class ids are dense indices, so the class count is max + 1.
        self.n_classes = y.iter().max().map_or(0, |&m| m + 1);

        self.boosters = Vec::with_capacity(self.n_classes);
        for class in 0..self.n_classes {
            let membership: Vec<f32> = y
                .iter()
                .map(|&label| if label == class { 1.0 } else { 0.0 })
                .collect();
            self.boosters.push(BinaryBooster::fit(
                x,
                &membership,
                self.n_estimators,
                self.learning_rate,
                self.max_depth,
            )?);
        }
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vec<usize>> {
        if self.boosters.is_empty() {
            return Err(AgritypeError::not_fitted("GradientBoostingClassifier"));
        }

        let n_samples = x.n_rows();
        let mut scores = vec![vec![0.0f32; self.n_classes]; n_samples];
        for (class, booster) in self.boosters.iter().enumerate() {
            let raw = booster.decision_function(x, self.learning_rate)?;
            for (row, &r) in raw.iter().enumerate() {
                scores[row][class] = r;
            }
        }

        // Argmax with lowest class index winning ties.
        Ok(scores
            .iter()
            .map(|row| {
                let mut best = 0;
                let mut best_score = f32::NEG_INFINITY;
                for (class, &score) in row.iter().enumerate() {
                    if score > best_score {
                        best_score = score;
                        best = class;
                    }
                }
                best
            })
            .collect())
    }
}
