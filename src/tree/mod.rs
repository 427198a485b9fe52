//! Decision trees and the tree ensembles built on them.
//!
//! The single CART classifier here is the weak learner shared by the two
//! candidate model families: bagged forests ([`RandomForestClassifier`]) and
//! boosted stumps ([`boosting::GradientBoostingClassifier`]).

mod boosting;
mod forest;

pub use boosting::GradientBoostingClassifier;
pub use forest::RandomForestClassifier;

use crate::error::{AgritypeError, Result};
use crate::primitives::Matrix;
use crate::traits::Classifier;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A node in a classification tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    /// Terminal node carrying the predicted class.
    Leaf {
        class_label: usize,
        n_samples: usize,
    },
    /// Internal split on `feature_idx <= threshold`.
    Split {
        feature_idx: usize,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// CART-style decision tree classifier using Gini impurity.
///
/// Splits are chosen greedily over midpoints of sorted unique feature
/// values, so fitting is fully deterministic for a given dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeClassifier {
    max_depth: Option<usize>,
    root: Option<TreeNode>,
}

impl DecisionTreeClassifier {
    /// Creates a new unfitted tree with unlimited depth.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_depth: None,
            root: None,
        }
    }

    /// Sets the maximum tree depth.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    /// Returns the depth of the fitted tree (leaf-only tree has depth 0).
    #[must_use]
    pub fn depth(&self) -> usize {
        fn node_depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + node_depth(left).max(node_depth(right))
                }
            }
        }
        self.root.as_ref().map_or(0, node_depth)
    }
}

impl Default for DecisionTreeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier for DecisionTreeClassifier {
    fn fit(&mut self, x: &Matrix<f32>, y: &[usize]) -> Result<()> {
        if x.n_rows() != y.len() {
            return Err(AgritypeError::dimension_mismatch(
                "samples",
                x.n_rows(),
                y.len(),
            ));
        }
        if y.is_empty() {
            return Err(AgritypeError::empty_input("DecisionTreeClassifier fit"));
        }
        self.root = Some(build_tree(x, y, 0, self.max_depth));
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vec<usize>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| AgritypeError::not_fitted("DecisionTreeClassifier"))?;
        Ok((0..x.n_rows())
            .map(|row| predict_row(root, x.row(row)))
            .collect())
    }
}

fn predict_row(node: &TreeNode, row: &[f32]) -> usize {
    match node {
        TreeNode::Leaf { class_label, .. } => *class_label,
        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
        } => {
            // NaN comparisons are false, so missing values go right.
            if row[*feature_idx] <= *threshold {
                predict_row(left, row)
            } else {
                predict_row(right, row)
            }
        }
    }
}

/// Gini impurity of a label set: 1 - Σ(p_i²).
pub(crate) fn gini_impurity(labels: &[usize]) -> f32 {
    if labels.is_empty() {
        return 0.0;
    }
    // BTreeMap for deterministic iteration order.
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0usize) += 1;
    }
    let n = labels.len() as f32;
    let mut gini = 1.0;
    for count in counts.values() {
        let p = *count as f32 / n;
        gini -= p * p;
    }
    gini
}

fn gini_split(left: &[usize], right: &[usize]) -> f32 {
    let n_left = left.len() as f32;
    let n_right = right.len() as f32;
    let n_total = n_left + n_right;
    if n_total == 0.0 {
        return 0.0;
    }
    (n_left / n_total) * gini_impurity(left) + (n_right / n_total) * gini_impurity(right)
}

fn sorted_unique_values(x: &[f32]) -> Vec<f32> {
    let mut values: Vec<f32> = x.iter().copied().filter(|v| !v.is_nan()).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    values.dedup_by(|a, b| (*a - *b).abs() < 1e-10);
    values
}

fn find_best_split_for_feature(x: &[f32], y: &[usize]) -> Option<(f32, f32)> {
    let unique_values = sorted_unique_values(x);
    if unique_values.len() < 2 {
        return None;
    }

    let current_impurity = gini_impurity(y);
    let mut best_gain = 0.0;
    let mut best_threshold = 0.0;

    for pair in unique_values.windows(2) {
        let threshold = (pair[0] + pair[1]) / 2.0;
        let mut left = Vec::new();
        let mut right = Vec::new();
        for (idx, &val) in x.iter().enumerate() {
            if val <= threshold {
                left.push(y[idx]);
            } else {
                right.push(y[idx]);
            }
        }
        if left.is_empty() || right.is_empty() {
            continue;
        }
        let gain = current_impurity - gini_split(&left, &right);
        if gain > best_gain {
            best_gain = gain;
            best_threshold = threshold;
        }
    }

    (best_gain > 0.0).then_some((best_threshold, best_gain))
}

fn find_best_split(x: &Matrix<f32>, y: &[usize]) -> Option<(usize, f32)> {
    let (n_samples, n_features) = x.shape();
    if n_samples < 2 {
        return None;
    }

    let mut best_gain = 0.0;
    let mut best = None;
    for feature_idx in 0..n_features {
        let column = x.column(feature_idx);
        if let Some((threshold, gain)) = find_best_split_for_feature(&column, y) {
            if gain > best_gain {
                best_gain = gain;
                best = Some((feature_idx, threshold));
            }
        }
    }
    best
}

/// Majority class with deterministic tie-breaking (lowest class wins).
pub(crate) fn majority_class(labels: &[usize]) -> usize {
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0usize) += 1;
    }
    counts
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .map_or(0, |(label, _)| label)
}

fn build_tree(x: &Matrix<f32>, y: &[usize], depth: usize, max_depth: Option<usize>) -> TreeNode {
    let n_samples = y.len();

    let unique: HashSet<_> = y.iter().collect();
    if unique.len() == 1 {
        return TreeNode::Leaf {
            class_label: y[0],
            n_samples,
        };
    }
    if let Some(max_d) = max_depth {
        if depth >= max_d {
            return TreeNode::Leaf {
                class_label: majority_class(y),
                n_samples,
            };
        }
    }

    let Some((feature_idx, threshold)) = find_best_split(x, y) else {
        return TreeNode::Leaf {
            class_label: majority_class(y),
            n_samples,
        };
    };

    let mut left_indices = Vec::new();
    let mut right_indices = Vec::new();
    for row in 0..n_samples {
        if x.get(row, feature_idx) <= threshold {
            left_indices.push(row);
        } else {
            right_indices.push(row);
        }
    }
    if left_indices.is_empty() || right_indices.is_empty() {
        return TreeNode::Leaf {
            class_label: majority_class(y),
            n_samples,
        };
    }

    let left_x = x.take_rows(&left_indices);
    let left_y: Vec<usize> = left_indices.iter().map(|&i| y[i]).collect();
    let right_x = x.take_rows(&right_indices);
    let right_y: Vec<usize> = right_indices.iter().map(|&i| y[i]).collect();

    TreeNode::Split {
        feature_idx,
        threshold,
        left: Box::new(build_tree(&left_x, &left_y, depth + 1, max_depth)),
        right: Box::new(build_tree(&right_x, &right_y, depth + 1, max_depth)),
    }
}

/// Bootstrap sample indices (with replacement), seeded when requested.
pub(crate) fn bootstrap_sample(n_samples: usize, random_state: Option<u64>) -> Vec<usize> {
    use rand::distributions::{Distribution, Uniform};
    use rand::SeedableRng;

    let dist = Uniform::from(0..n_samples);
    let mut indices = Vec::with_capacity(n_samples);

    if let Some(seed) = random_state {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        for _ in 0..n_samples {
            indices.push(dist.sample(&mut rng));
        }
    } else {
        let mut rng = rand::thread_rng();
        for _ in 0..n_samples {
            indices.push(dist.sample(&mut rng));
        }
    }

    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xor_like() -> (Matrix<f32>, Vec<usize>) {
        // Separable by two axis-aligned splits.
        let x = Matrix::from_vec(
            8,
            2,
            vec![
                1.0, 1.0, 1.0, 2.0, 2.0, 1.0, 2.0, 2.0, //
                5.0, 5.0, 5.0, 6.0, 6.0, 5.0, 6.0, 6.0,
            ],
        )
        .unwrap();
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_gini_impurity_pure_and_mixed() {
        assert_eq!(gini_impurity(&[1, 1, 1]), 0.0);
        assert!((gini_impurity(&[0, 1]) - 0.5).abs() < 1e-6);
        assert_eq!(gini_impurity(&[]), 0.0);
    }

    #[test]
    fn test_majority_class_tie_breaks_low() {
        assert_eq!(majority_class(&[2, 1, 2, 1]), 1);
        assert_eq!(majority_class(&[3, 3, 0]), 3);
    }

    #[test]
    fn test_tree_fits_separable_data() {
        let (x, y) = xor_like();
        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).expect("fit");
        assert_eq!(tree.predict(&x).expect("predict"), y);
    }

    #[test]
    fn test_tree_max_depth_zero_is_majority_leaf() {
        let (x, y) = xor_like();
        let mut tree = DecisionTreeClassifier::new().with_max_depth(0);
        tree.fit(&x, &y).expect("fit");
        assert_eq!(tree.depth(), 0);
        let preds = tree.predict(&x).expect("predict");
        // Tie between classes 0 and 1, lowest wins.
        assert!(preds.iter().all(|&p| p == 0));
    }

    #[test]
    fn test_tree_predict_before_fit_errors() {
        let tree = DecisionTreeClassifier::new();
        let err = tree.predict(&Matrix::zeros(1, 2)).unwrap_err();
        assert!(err.to_string().contains("not fitted"));
    }

    #[test]
    fn test_tree_dimension_mismatch() {
        let x = Matrix::zeros(3, 2);
        let mut tree = DecisionTreeClassifier::new();
        assert!(tree.fit(&x, &[0, 1]).is_err());
    }

    #[test]
    fn test_tree_serde_roundtrip_preserves_predictions() {
        let (x, y) = xor_like();
        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).expect("fit");
        let bytes = bincode::serialize(&tree).unwrap();
        let restored: DecisionTreeClassifier = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored.predict(&x).unwrap(), tree.predict(&x).unwrap());
    }

    #[test]
    fn test_bootstrap_sample_reproducible() {
        let a = bootstrap_sample(50, Some(42));
        let b = bootstrap_sample(50, Some(42));
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        assert!(a.iter().all(|&i| i < 50));
    }

    #[test]
    fn test_bootstrap_sample_different_seeds_differ() {
        assert_ne!(bootstrap_sample(50, Some(1)), bootstrap_sample(50, Some(2)));
    }

    #[test]
    fn test_nan_routes_right() {
        let x = Matrix::from_vec(4, 1, vec![1.0, 2.0, 10.0, 11.0]).unwrap();
        let y = vec![0, 0, 1, 1];
        let mut tree = DecisionTreeClassifier::new();
        tree.fit(&x, &y).expect("fit");
        let probe = Matrix::from_vec(1, 1, vec![f32::NAN]).unwrap();
        // Must not panic; NaN falls through the right branch.
        assert_eq!(tree.predict(&probe).expect("predict"), vec![1]);
    }
}
