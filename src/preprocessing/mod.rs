//! Feature preprocessing: standardization and one-hot encoding.
//!
//! The fitted state of every transformer here is serializable so it can be
//! embedded in the model artifact and reused unchanged at serving time.

use crate::dataset::FeatureTable;
use crate::error::{AgritypeError, Result};
use crate::primitives::Matrix;
use crate::traits::Transformer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Standardizes numeric features to zero mean and unit variance.
///
/// Uses the population standard deviation. Missing cells (NaN) are ignored
/// when computing statistics and pass through transform unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    means: Option<Vec<f32>>,
    stds: Option<Vec<f32>>,
}

impl StandardScaler {
    /// Creates a new unfitted scaler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the fitted per-column means, if fitted.
    #[must_use]
    pub fn means(&self) -> Option<&[f32]> {
        self.means.as_deref()
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, x: &Matrix<f32>) -> Result<()> {
        let (n_rows, n_cols) = x.shape();
        if n_rows == 0 {
            return Err(AgritypeError::empty_input("StandardScaler fit"));
        }

        let mut means = vec![0.0f32; n_cols];
        let mut stds = vec![0.0f32; n_cols];

        for col in 0..n_cols {
            let values: Vec<f32> = x.column(col).into_iter().filter(|v| !v.is_nan()).collect();
            if values.is_empty() {
                means[col] = 0.0;
                stds[col] = 1.0;
                continue;
            }
            let n = values.len() as f32;
            let mean = values.iter().sum::<f32>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / n;
            let std = variance.sqrt();
            means[col] = mean;
            // Near-constant columns pass through centered but unscaled.
            stds[col] = if std > 1e-10 { std } else { 1.0 };
        }

        self.means = Some(means);
        self.stds = Some(stds);
        Ok(())
    }

    fn transform(&self, x: &Matrix<f32>) -> Result<Matrix<f32>> {
        let means = self
            .means
            .as_ref()
            .ok_or_else(|| AgritypeError::not_fitted("StandardScaler"))?;
        let stds = self
            .stds
            .as_ref()
            .ok_or_else(|| AgritypeError::not_fitted("StandardScaler"))?;

        let (n_rows, n_cols) = x.shape();
        if n_cols != means.len() {
            return Err(AgritypeError::dimension_mismatch(
                "StandardScaler columns",
                means.len(),
                n_cols,
            ));
        }

        let mut out = Matrix::zeros(n_rows, n_cols);
        for row in 0..n_rows {
            for col in 0..n_cols {
                let value = x.get(row, col);
                let scaled = if value.is_nan() {
                    value
                } else {
                    (value - means[col]) / stds[col]
                };
                out.set(row, col, scaled);
            }
        }
        Ok(out)
    }
}

/// One-hot encodes string columns against a vocabulary learned at fit time.
///
/// Category vocabularies are sorted per column, so indicator layout is
/// deterministic across runs. Categories unseen during fit encode as an
/// all-zero indicator block rather than failing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// Sorted vocabulary per input column.
    vocabularies: Option<Vec<Vec<String>>>,
}

impl OneHotEncoder {
    /// Creates a new unfitted encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits the per-column category vocabularies.
    ///
    /// # Errors
    ///
    /// Returns an error if `columns` is empty or any column has no rows.
    pub fn fit(&mut self, columns: &[Vec<String>]) -> Result<()> {
        if columns.is_empty() || columns.iter().any(Vec::is_empty) {
            return Err(AgritypeError::empty_input("OneHotEncoder fit"));
        }
        let vocabularies: Vec<Vec<String>> = columns
            .iter()
            .map(|col| {
                let set: BTreeSet<&String> = col.iter().collect();
                set.into_iter().cloned().collect()
            })
            .collect();
        self.vocabularies = Some(vocabularies);
        Ok(())
    }

    /// Encodes string columns to an indicator matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if the encoder is not fitted or the column count
    /// differs from fit time.
    pub fn transform(&self, columns: &[Vec<String>]) -> Result<Matrix<f32>> {
        let vocabularies = self
            .vocabularies
            .as_ref()
            .ok_or_else(|| AgritypeError::not_fitted("OneHotEncoder"))?;
        if columns.len() != vocabularies.len() {
            return Err(AgritypeError::dimension_mismatch(
                "OneHotEncoder columns",
                vocabularies.len(),
                columns.len(),
            ));
        }

        let n_rows = columns.first().map_or(0, Vec::len);
        let total_width: usize = vocabularies.iter().map(Vec::len).sum();
        let mut out = Matrix::zeros(n_rows, total_width);

        let mut offset = 0;
        for (col, vocab) in columns.iter().zip(vocabularies.iter()) {
            if col.len() != n_rows {
                return Err(AgritypeError::dimension_mismatch(
                    "OneHotEncoder rows",
                    n_rows,
                    col.len(),
                ));
            }
            for (row, value) in col.iter().enumerate() {
                // Unseen categories leave the whole block at zero.
                if let Ok(pos) = vocab.binary_search(value) {
                    out.set(row, offset + pos, 1.0);
                }
            }
            offset += vocab.len();
        }
        Ok(out)
    }

    /// Total width of the encoded indicator block.
    #[must_use]
    pub fn encoded_width(&self) -> usize {
        self.vocabularies
            .as_ref()
            .map_or(0, |v| v.iter().map(Vec::len).sum())
    }
}

/// Combined preprocessor for the mixed numeric/categorical feature table.
///
/// Output layout is the scaled numeric block followed by the one-hot
/// indicator block, matching the training column order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TablePreprocessor {
    scaler: StandardScaler,
    encoder: OneHotEncoder,
}

impl TablePreprocessor {
    /// Creates a new unfitted preprocessor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fits scaler and encoder on a training feature table.
    ///
    /// # Errors
    ///
    /// Returns an error if the table is empty.
    pub fn fit(&mut self, table: &FeatureTable) -> Result<()> {
        self.scaler.fit(table.numeric())?;
        self.encoder.fit(table.categorical())?;
        Ok(())
    }

    /// Transforms a feature table into a dense model-input matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if not fitted or if the table doesn't match the
    /// fitted schema.
    pub fn transform(&self, table: &FeatureTable) -> Result<Matrix<f32>> {
        let numeric = self.scaler.transform(table.numeric())?;
        let encoded = self.encoder.transform(table.categorical())?;
        numeric.hstack(&encoded).map_err(Into::into)
    }

    /// Fits and transforms in one step.
    ///
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    pub fn fit_transform(&mut self, table: &FeatureTable) -> Result<Matrix<f32>> {
        self.fit(table)?;
        self.transform(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaler_zero_mean_unit_variance() {
        let x = Matrix::from_vec(4, 1, vec![2.0, 4.0, 6.0, 8.0]).unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&x).expect("fit_transform");
        let mean: f32 = out.column(0).iter().sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-6);
        let var: f32 = out.column(0).iter().map(|v| v * v).sum::<f32>() / 4.0;
        assert!((var - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_scaler_constant_column() {
        let x = Matrix::from_vec(3, 1, vec![5.0, 5.0, 5.0]).unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&x).expect("fit_transform");
        for row in 0..3 {
            assert_eq!(out.get(row, 0), 0.0);
        }
    }

    #[test]
    fn test_scaler_ignores_nan_in_stats() {
        let x = Matrix::from_vec(3, 1, vec![2.0, f32::NAN, 4.0]).unwrap();
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(&x).expect("fit_transform");
        // mean 3, std 1
        assert!((out.get(0, 0) + 1.0).abs() < 1e-6);
        assert!(out.get(1, 0).is_nan());
        assert!((out.get(2, 0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_scaler_not_fitted() {
        let scaler = StandardScaler::new();
        let err = scaler.transform(&Matrix::zeros(1, 1)).unwrap_err();
        assert!(err.to_string().contains("not fitted"));
    }

    #[test]
    fn test_scaler_column_mismatch() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&Matrix::zeros(2, 3)).expect("fit");
        assert!(scaler.transform(&Matrix::zeros(2, 2)).is_err());
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_encoder_sorted_vocabulary() {
        let cols = vec![strings(&["b", "a", "b"])];
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&cols).expect("fit");
        let out = encoder.transform(&cols).expect("transform");
        assert_eq!(out.shape(), (3, 2));
        // "a" gets the first indicator column.
        assert_eq!(out.row(0), &[0.0, 1.0]);
        assert_eq!(out.row(1), &[1.0, 0.0]);
    }

    #[test]
    fn test_encoder_unseen_category_all_zero() {
        let mut encoder = OneHotEncoder::new();
        encoder.fit(&[strings(&["x", "y"])]).expect("fit");
        let out = encoder.transform(&[strings(&["z"])]).expect("transform");
        assert_eq!(out.row(0), &[0.0, 0.0]);
    }

    #[test]
    fn test_encoder_multiple_columns_offsets() {
        let mut encoder = OneHotEncoder::new();
        encoder
            .fit(&[strings(&["a", "b"]), strings(&["u", "v"])])
            .expect("fit");
        assert_eq!(encoder.encoded_width(), 4);
        let out = encoder
            .transform(&[strings(&["b"]), strings(&["u"])])
            .expect("transform");
        assert_eq!(out.row(0), &[0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_encoder_not_fitted() {
        let encoder = OneHotEncoder::new();
        assert!(encoder.transform(&[strings(&["a"])]).is_err());
    }

    fn sample_table() -> FeatureTable {
        let numeric = Matrix::from_vec(
            2,
            8,
            vec![
                80.0, 1.5, 60.0, 40.0, 50.0, 20.0, 10.0, 15.0, //
                120.0, 2.0, 90.0, 60.0, 70.0, 30.0, 15.0, 25.0,
            ],
        )
        .unwrap();
        FeatureTable::new(
            numeric,
            vec![
                strings(&["Bretagne", "Normandie"]),
                strings(&["Bovins Lait", "Bovins Lait"]),
            ],
            strings(&[
                "sau",
                "umo",
                "ugb",
                "nb_vl",
                "surface_sfp",
                "surface_herbe_pp",
                "surface_herbe_pt",
                "surface_culture",
            ]),
            strings(&["region", "filiere"]),
        )
        .unwrap()
    }

    #[test]
    fn test_table_preprocessor_layout() {
        let table = sample_table();
        let mut prep = TablePreprocessor::new();
        let out = prep.fit_transform(&table).expect("fit_transform");
        // 8 scaled numeric + 2 region indicators + 1 filiere indicator
        assert_eq!(out.shape(), (2, 11));
        // filiere is constant so both rows share the same last indicator.
        assert_eq!(out.get(0, 10), 1.0);
        assert_eq!(out.get(1, 10), 1.0);
    }

    #[test]
    fn test_table_preprocessor_serde_roundtrip() {
        let table = sample_table();
        let mut prep = TablePreprocessor::new();
        let expected = prep.fit_transform(&table).expect("fit_transform");
        let bytes = bincode::serialize(&prep).unwrap();
        let restored: TablePreprocessor = bincode::deserialize(&bytes).unwrap();
        let actual = restored.transform(&table).expect("transform");
        assert_eq!(actual, expected);
    }
}
