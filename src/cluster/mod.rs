//! K-means clustering used as a structural diagnostic.
//!
//! The training pipeline clusters the standardized numeric features and
//! cross-tabulates cluster assignments against K-Type labels to show how
//! well the unsupervised structure lines up with the expert taxonomy. The
//! result is logged, never asserted on.

use crate::error::{AgritypeError, Result};
use crate::primitives::Matrix;
use crate::traits::UnsupervisedEstimator;
use std::fmt;

/// K-means clustering with deterministic seeded initialization.
///
/// Initialization picks the first centroid from the seed and the rest by
/// farthest-point selection, so a fixed seed gives identical assignments
/// on identical data. Iteration is standard Lloyd's algorithm.
#[derive(Debug, Clone)]
pub struct KMeans {
    n_clusters: usize,
    max_iter: usize,
    tol: f32,
    random_state: u64,
    centroids: Option<Matrix<f32>>,
    inertia: Option<f32>,
    n_iter: usize,
}

impl KMeans {
    /// Creates a new K-means model with `n_clusters` clusters.
    #[must_use]
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters,
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
            centroids: None,
            inertia: None,
            n_iter: 0,
        }
    }

    /// Sets the maximum number of Lloyd iterations.
    #[must_use]
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Sets the random seed used for centroid initialization.
    #[must_use]
    pub fn with_random_state(mut self, random_state: u64) -> Self {
        self.random_state = random_state;
        self
    }

    /// Returns the within-cluster sum of squared distances, if fitted.
    #[must_use]
    pub fn inertia(&self) -> Option<f32> {
        self.inertia
    }

    /// Returns the number of Lloyd iterations the last fit ran.
    #[must_use]
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Returns the fitted centroids, if fitted.
    #[must_use]
    pub fn centroids(&self) -> Option<&Matrix<f32>> {
        self.centroids.as_ref()
    }

    fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
    }

    /// First centroid from the seed, remaining ones by farthest-point.
    fn init_centroids(&self, x: &Matrix<f32>) -> Matrix<f32> {
        let (n_rows, n_cols) = x.shape();
        let mut chosen: Vec<usize> = vec![(self.random_state as usize) % n_rows];

        while chosen.len() < self.n_clusters {
            let mut best_idx = 0;
            let mut best_dist = -1.0f32;
            for row in 0..n_rows {
                let dist = chosen
                    .iter()
                    .map(|&c| Self::squared_distance(x.row(row), x.row(c)))
                    .fold(f32::INFINITY, f32::min);
                if dist > best_dist {
                    best_dist = dist;
                    best_idx = row;
                }
            }
            chosen.push(best_idx);
        }

        let mut centroids = Matrix::zeros(self.n_clusters, n_cols);
        for (k, &row) in chosen.iter().enumerate() {
            for col in 0..n_cols {
                centroids.set(k, col, x.get(row, col));
            }
        }
        centroids
    }

    fn assign(&self, x: &Matrix<f32>, centroids: &Matrix<f32>) -> (Vec<usize>, f32) {
        let n_rows = x.n_rows();
        let mut labels = vec![0usize; n_rows];
        let mut inertia = 0.0f32;
        for row in 0..n_rows {
            let mut best_k = 0;
            let mut best_dist = f32::INFINITY;
            for k in 0..self.n_clusters {
                let dist = Self::squared_distance(x.row(row), centroids.row(k));
                if dist < best_dist {
                    best_dist = dist;
                    best_k = k;
                }
            }
            labels[row] = best_k;
            inertia += best_dist;
        }
        (labels, inertia)
    }
}

impl UnsupervisedEstimator for KMeans {
    type Labels = Vec<usize>;

    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        let (n_rows, n_cols) = x.shape();
        if n_rows == 0 {
            return Err(AgritypeError::empty_input("KMeans fit"));
        }
        if self.n_clusters == 0 || self.n_clusters > n_rows {
            return Err(AgritypeError::InvalidHyperparameter {
                param: "n_clusters".to_string(),
                value: self.n_clusters.to_string(),
                constraint: format!("must be in 1..={n_rows} (number of samples)"),
            });
        }

        let mut centroids = self.init_centroids(x);
        let mut inertia = f32::INFINITY;
        let mut iterations = 0;

        for iter in 0..self.max_iter {
            iterations = iter + 1;
            let (labels, new_inertia) = self.assign(x, &centroids);

            // Recompute centroids; empty clusters keep their position.
            let mut sums = Matrix::zeros(self.n_clusters, n_cols);
            let mut counts = vec![0usize; self.n_clusters];
            for (row, &k) in labels.iter().enumerate() {
                counts[k] += 1;
                for col in 0..n_cols {
                    sums.set(k, col, sums.get(k, col) + x.get(row, col));
                }
            }
            for k in 0..self.n_clusters {
                if counts[k] > 0 {
                    for col in 0..n_cols {
                        centroids.set(k, col, sums.get(k, col) / counts[k] as f32);
                    }
                }
            }

            if (inertia - new_inertia).abs() < self.tol {
                inertia = new_inertia;
                break;
            }
            inertia = new_inertia;
        }

        self.centroids = Some(centroids);
        self.inertia = Some(inertia);
        self.n_iter = iterations;
        Ok(())
    }

    fn predict(&self, x: &Matrix<f32>) -> Result<Vec<usize>> {
        let centroids = self
            .centroids
            .as_ref()
            .ok_or_else(|| AgritypeError::not_fitted("KMeans"))?;
        if x.n_cols() != centroids.n_cols() {
            return Err(AgritypeError::dimension_mismatch(
                "KMeans features",
                centroids.n_cols(),
                x.n_cols(),
            ));
        }
        Ok(self.assign(x, centroids).0)
    }
}

/// Cross-tabulation of cluster assignments against class labels.
///
/// `counts[cluster][class]` is the number of samples with that pairing.
#[derive(Debug, Clone)]
pub struct ContingencyTable {
    counts: Vec<Vec<usize>>,
    class_names: Vec<String>,
}

impl ContingencyTable {
    /// Builds the table from parallel cluster/label vectors.
    ///
    /// # Errors
    ///
    /// Returns an error if the vectors differ in length or are empty.
    pub fn compute(
        clusters: &[usize],
        labels: &[usize],
        n_clusters: usize,
        class_names: &[String],
    ) -> Result<Self> {
        if clusters.len() != labels.len() {
            return Err(AgritypeError::dimension_mismatch(
                "cluster assignments",
                labels.len(),
                clusters.len(),
            ));
        }
        if clusters.is_empty() {
            return Err(AgritypeError::empty_input("contingency table"));
        }

        let mut counts = vec![vec![0usize; class_names.len()]; n_clusters];
        for (&cluster, &label) in clusters.iter().zip(labels.iter()) {
            counts[cluster][label] += 1;
        }
        Ok(Self {
            counts,
            class_names: class_names.to_vec(),
        })
    }

    /// Returns the raw count grid, cluster-major.
    #[must_use]
    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    /// Fraction of each cluster taken by its dominant class.
    ///
    /// Empty clusters report purity 0.
    #[must_use]
    pub fn cluster_purities(&self) -> Vec<f32> {
        self.counts
            .iter()
            .map(|row| {
                let total: usize = row.iter().sum();
                if total == 0 {
                    0.0
                } else {
                    let max = row.iter().max().copied().unwrap_or(0);
                    max as f32 / total as f32
                }
            })
            .collect()
    }

    /// Sample-weighted mean of the cluster purities.
    #[must_use]
    pub fn mean_purity(&self) -> f32 {
        let total: usize = self.counts.iter().flatten().sum();
        if total == 0 {
            return 0.0;
        }
        let dominant: usize = self
            .counts
            .iter()
            .map(|row| row.iter().max().copied().unwrap_or(0))
            .sum();
        dominant as f32 / total as f32
    }
}

impl fmt::Display for ContingencyTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>10}", "cluster")?;
        for name in &self.class_names {
            write!(f, " {name:>24}")?;
        }
        writeln!(f, " {:>8}", "purity")?;
        let purities = self.cluster_purities();
        for (k, row) in self.counts.iter().enumerate() {
            write!(f, "{k:>10}")?;
            for count in row {
                write!(f, " {count:>24}")?;
            }
            writeln!(f, " {:>8.3}", purities[k])?;
        }
        Ok(())
    }
}
