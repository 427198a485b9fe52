//! Random forest classifier: bagged CART trees with majority voting.

use super::{bootstrap_sample, DecisionTreeClassifier};
use crate::error::{AgritypeError, Result};
use crate::primitives::Matrix;
use crate::traits::Classifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Random forest classifier.
///
/// Each tree trains on a seeded bootstrap sample; tree `i` uses seed
/// `random_state + i`, so a fixed seed makes the whole ensemble
/// reproducible. Prediction is a majority vote with deterministic
/// tie-breaking (lowest class index wins).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    trees: Vec<DecisionTreeClassifier>,
    n_estimators: usize,
    max_depth: Option<usize>,
    random_state: Option<u64>,
}

impl RandomForestClassifier {
    /// Creates a new forest with `n_estimators` trees and unlimited depth.
    #[must_use]
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            random_state: None,
        }
    }

    /// Sets the maximum depth for each tree.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Sets the random seed for bootstrap sampling.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Returns the configured number of trees.
    #[must_use]
    pub fn n_estimators(&self) -> usize {
        self.n_estimators
    }

    /// Returns the configured maximum depth, if any.
    #[must_use]
    pub fn max_depth(&self) -> Option<usize> {
        self.max_depth
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &Matrix<f32>, y: &[usize]) -> Result<()> {
        let n_samples = x.n_rows();
        if n_samples != y.len() {
            return Err(AgritypeError::dimension_mismatch(
                "samples",
                n_samples,
                y.len(),
            ));
        }
        if n_samples == 0 {
            return Err(AgritypeError::empty_input("RandomForestClassifier fit"));
        }
        if self.n_estimators == 0 {
            return Err(AgritypeError::InvalidHyperparameter {
                param: "n_estimators".to_string(),
                value: "0".to_string(),
                constraint: "must be at least 1".to_string(),
            });
        }

        self.trees = Vec::with_capacity(self.n_estimators);
        for i in 0..self.n_estimators {
            let seed = self.random_state.map(|s| s + i as u64);
            let indices = bootstrap_sample(n_samples, seed);
            let bootstrap_x = x.take_rows(&indices);
            let bootstrap_y: Vec<usize> = indices.iter().map(|&idx| y[idx]).collect();

            let mut tree = match self.max_depth {
                Some(max_depth) => DecisionTreeClassifier::new().with_max_depth(max_depth),
                None => DecisionTreeClassifier::new(),
            };
            tree.fit(&bootstrap_x, &bootstrap_y)?;
            self.trees.push(tree);
        }
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vec<usize>> {
        if self.trees.is_empty() {
            return Err(AgritypeError::not_fitted("RandomForestClassifier"));
        }

        let n_samples = x.n_rows();
        let mut votes: Vec<BTreeMap<usize, usize>> = vec![BTreeMap::new(); n_samples];
        for tree in &self.trees {
            for (row, &label) in tree.predict(x)?.iter().enumerate() {
                *votes[row].entry(label).or_insert(0) += 1;
            }
        }

        Ok(votes
            .into_iter()
            .map(|counts| {
                counts
                    .into_iter()
                    .max_by_key(|&(_, count)| count)
                    .map_or(0, |(label, _)| label)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blobs() -> (Matrix<f32>, Vec<usize>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..10 {
            data.extend_from_slice(&[i as f32 * 0.1, i as f32 * 0.1 + 0.5]);
            labels.push(0);
        }
        for i in 0..10 {
            data.extend_from_slice(&[10.0 + i as f32 * 0.1, 10.5 + i as f32 * 0.1]);
            labels.push(1);
        }
        (Matrix::from_vec(20, 2, data).unwrap(), labels)
    }

    #[test]
    fn test_forest_fits_and_predicts() {
        let (x, y) = blobs();
        let mut rf = RandomForestClassifier::new(10).with_random_state(42);
        rf.fit(&x, &y).expect("fit");
        assert_eq!(rf.predict(&x).expect("predict"), y);
    }

    #[test]
    fn test_forest_reproducible_with_seed() {
        let (x, y) = blobs();
        let mut a = RandomForestClassifier::new(10).with_random_state(42);
        let mut b = RandomForestClassifier::new(10).with_random_state(42);
        a.fit(&x, &y).expect("fit a");
        b.fit(&x, &y).expect("fit b");
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_forest_predict_before_fit() {
        let rf = RandomForestClassifier::new(5);
        assert!(rf.predict(&Matrix::zeros(1, 2)).is_err());
    }

    #[test]
    fn test_forest_zero_estimators_rejected() {
        let (x, y) = blobs();
        let mut rf = RandomForestClassifier::new(0);
        let err = rf.fit(&x, &y).unwrap_err();
        assert!(matches!(err, AgritypeError::InvalidHyperparameter { .. }));
    }

    #[test]
    fn test_forest_serde_roundtrip() {
        let (x, y) = blobs();
        let mut rf = RandomForestClassifier::new(5).with_random_state(7).with_max_depth(4);
        rf.fit(&x, &y).expect("fit");
        let bytes = bincode::serialize(&rf).unwrap();
        let restored: RandomForestClassifier = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), rf.predict(&x).unwrap());
    }

    #[test]
    fn test_forest_score() {
        let (x, y) = blobs();
        let mut rf = RandomForestClassifier::new(10).with_random_state(42);
        rf.fit(&x, &y).expect("fit");
        let acc = rf.score(&x, &y).expect("score");
        assert!(acc > 0.95);
    }
}
