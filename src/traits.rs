//! Core traits for transformers and classifiers.
//!
//! These traits define the API contracts shared by the preprocessing and
//! candidate-model components, so grid search and cross-validation can treat
//! the random-forest and gradient-boosting candidates uniformly.

use crate::error::Result;
use crate::primitives::Matrix;

/// Trait for data transformers (scalers, encoders, etc.).
pub trait Transformer {
    /// Fits the transformer to data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()>;

    /// Transforms data using fitted parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if the transformer is not fitted.
    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>>;

    /// Fits and transforms in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    fn fit_transform(&mut self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        self.fit(x)?;
        self.transform(x)
    }
}

/// Trait for supervised classifiers over class-index labels.
///
/// Labels are dense class indices (`0..n_classes`); the mapping back to
/// K-Type strings lives with the dataset/artifact, not the classifier.
pub trait Classifier {
    /// Fits the model to training data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails (dimension mismatch, empty data, etc.).
    fn fit(&mut self, x: &Matrix<f32>, y: &[usize]) -> Result<()>;

    /// Predicts class indices for input data.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted.
    fn predict(&self, x: &Matrix<f32>) -> Result<Vec<usize>>;

    /// Computes classification accuracy on test data.
    ///
    /// # Errors
    ///
    /// Returns an error if prediction fails.
    fn score(&self, x: &Matrix<f32>, y: &[usize]) -> Result<f32> {
        let predictions = self.predict(x)?;
        Ok(crate::metrics::accuracy(&predictions, y))
    }
}

/// Trait for unsupervised estimators (clustering).
pub trait UnsupervisedEstimator {
    /// The type of labels/clusters produced.
    type Labels;

    /// Fits the model to data.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails (empty data, invalid parameters, etc.).
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()>;

    /// Predicts cluster assignments for data.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not fitted.
    fn predict(&self, x: &Matrix<f32>) -> Result<Self::Labels>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgritypeError;

    struct MeanScaler {
        scale: Option<f32>,
    }

    impl Transformer for MeanScaler {
        fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
            if x.n_rows() == 0 {
                return Err(AgritypeError::empty_input("MeanScaler fit"));
            }
            let sum: f32 = x.as_slice().iter().sum();
            let mean = sum / x.as_slice().len() as f32;
            self.scale = Some(if mean == 0.0 { 1.0 } else { mean });
            Ok(())
        }

        fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
            let scale = self.scale.ok_or_else(|| AgritypeError::not_fitted("MeanScaler"))?;
            let data: Vec<f32> = x.as_slice().iter().map(|v| v / scale).collect();
            Matrix::from_vec(x.n_rows(), x.n_cols(), data).map_err(Into::into)
        }
    }

    #[test]
    fn test_fit_transform_default_impl() {
        let mut scaler = MeanScaler { scale: None };
        let x = Matrix::from_vec(2, 2, vec![2.0, 4.0, 6.0, 8.0]).unwrap();
        let out = scaler.fit_transform(&x).expect("fit_transform");
        // mean = 5.0
        assert!((out.get(0, 0) - 0.4).abs() < 1e-6);
        assert!((out.get(1, 1) - 1.6).abs() < 1e-6);
    }

    #[test]
    fn test_transform_without_fit_errors() {
        let scaler = MeanScaler { scale: None };
        let x = Matrix::zeros(1, 1);
        let err = scaler.transform(&x).unwrap_err();
        assert!(err.to_string().contains("not fitted"));
    }

    #[test]
    fn test_fit_empty_errors() {
        let mut scaler = MeanScaler { scale: None };
        let x = Matrix::from_vec(0, 2, vec![]).unwrap();
        assert!(scaler.fit(&x).is_err());
    }
}
