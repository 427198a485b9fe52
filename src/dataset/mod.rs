//! Farm reference dataset loading and preparation.
//!
//! Reads the synthetic/augmented farm CSV, validates the fixed column
//! schema, drops unlabeled rows, filters out K-Types with too little
//! support and produces the feature table / label vector pair the rest of
//! the pipeline consumes.

use crate::error::{AgritypeError, Result};
use crate::primitives::Matrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Numeric feature columns, in training order.
///
/// French farm-accounting units: utilized agricultural area (SAU), labor
/// units (UMO), livestock units (UGB), dairy-cow count, forage area (SFP),
/// permanent/temporary grassland and crop surfaces.
pub const NUMERIC_COLUMNS: [&str; 8] = [
    "sau",
    "umo",
    "ugb",
    "nb_vl",
    "surface_sfp",
    "surface_herbe_pp",
    "surface_herbe_pt",
    "surface_culture",
];

/// Categorical feature columns, in training order.
pub const CATEGORICAL_COLUMNS: [&str; 2] = ["region", "filiere"];

/// Label column holding the K-Type archetype string.
pub const LABEL_COLUMN: &str = "ktype";

/// Minimum number of supporting records for a K-Type to be retained.
///
/// Hard filter required for 3-fold cross-validation; deliberately not
/// configurable.
pub const MIN_CLASS_SUPPORT: usize = 5;

/// Feature columns split into a numeric block and categorical string columns.
///
/// Row order is shared across both blocks and with the label vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTable {
    numeric: Matrix<f32>,
    /// One `Vec<String>` per categorical column, each of length `n_rows`.
    categorical: Vec<Vec<String>>,
    numeric_names: Vec<String>,
    categorical_names: Vec<String>,
}

impl FeatureTable {
    /// Creates a feature table from a numeric block and categorical columns.
    ///
    /// # Errors
    ///
    /// Returns an error if any categorical column length differs from the
    /// numeric row count.
    pub fn new(
        numeric: Matrix<f32>,
        categorical: Vec<Vec<String>>,
        numeric_names: Vec<String>,
        categorical_names: Vec<String>,
    ) -> Result<Self> {
        let n_rows = numeric.n_rows();
        for (name, col) in categorical_names.iter().zip(categorical.iter()) {
            if col.len() != n_rows {
                return Err(AgritypeError::DimensionMismatch {
                    expected: format!("{n_rows} rows in categorical column '{name}'"),
                    actual: format!("{}", col.len()),
                });
            }
        }
        if categorical.len() != categorical_names.len() {
            return Err(AgritypeError::dimension_mismatch(
                "categorical columns",
                categorical_names.len(),
                categorical.len(),
            ));
        }
        Ok(Self {
            numeric,
            categorical,
            numeric_names,
            categorical_names,
        })
    }

    /// Builds a one-row table from a single farm's raw fields.
    ///
    /// Used at serving time; column names and order match training.
    ///
    /// # Errors
    ///
    /// Returns an error if the field counts don't match the schema.
    pub fn single_row(numeric: &[f32], categorical: &[String]) -> Result<Self> {
        if numeric.len() != NUMERIC_COLUMNS.len() {
            return Err(AgritypeError::dimension_mismatch(
                "numeric fields",
                NUMERIC_COLUMNS.len(),
                numeric.len(),
            ));
        }
        if categorical.len() != CATEGORICAL_COLUMNS.len() {
            return Err(AgritypeError::dimension_mismatch(
                "categorical fields",
                CATEGORICAL_COLUMNS.len(),
                categorical.len(),
            ));
        }
        let matrix = Matrix::from_vec(1, numeric.len(), numeric.to_vec())
            .map_err(AgritypeError::from)?;
        Self::new(
            matrix,
            categorical.iter().map(|v| vec![v.clone()]).collect(),
            NUMERIC_COLUMNS.iter().map(|s| (*s).to_string()).collect(),
            CATEGORICAL_COLUMNS.iter().map(|s| (*s).to_string()).collect(),
        )
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.numeric.n_rows()
    }

    /// Returns the numeric feature block.
    #[must_use]
    pub fn numeric(&self) -> &Matrix<f32> {
        &self.numeric
    }

    /// Returns the categorical columns (column-major).
    #[must_use]
    pub fn categorical(&self) -> &[Vec<String>] {
        &self.categorical
    }

    /// Returns the numeric column names in training order.
    #[must_use]
    pub fn numeric_names(&self) -> &[String] {
        &self.numeric_names
    }

    /// Returns the categorical column names in training order.
    #[must_use]
    pub fn categorical_names(&self) -> &[String] {
        &self.categorical_names
    }

    /// Builds a new table from the given row indices (repeats allowed).
    ///
    /// # Panics
    ///
    /// Panics if any index is out of bounds.
    #[must_use]
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        Self {
            numeric: self.numeric.take_rows(indices),
            categorical: self
                .categorical
                .iter()
                .map(|col| indices.iter().map(|&i| col[i].clone()).collect())
                .collect(),
            numeric_names: self.numeric_names.clone(),
            categorical_names: self.categorical_names.clone(),
        }
    }
}

/// Prepared farm dataset: features, encoded labels and class vocabulary.
#[derive(Debug, Clone)]
pub struct FarmDataset {
    /// Feature table in retained-row order.
    pub features: FeatureTable,
    /// Encoded labels; `labels[i]` indexes into `classes`.
    pub labels: Vec<usize>,
    /// Sorted K-Type vocabulary, index = class id.
    pub classes: Vec<String>,
    /// Rows dropped because the label cell was empty.
    pub dropped_unlabeled: usize,
    /// Rows dropped by the rare-label filter.
    pub dropped_rare_rows: usize,
    /// K-Types dropped by the rare-label filter.
    pub dropped_rare_classes: Vec<String>,
}

impl FarmDataset {
    /// Loads and prepares the dataset from a CSV file.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, missing columns, malformed numeric
    /// cells, or if no usable rows remain.
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(file)
    }

    /// Loads and prepares the dataset from any CSV reader.
    ///
    /// # Errors
    ///
    /// Returns an error on missing columns, malformed numeric cells, or if
    /// no usable rows remain.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let column_index = |name: &str| -> Result<usize> {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| AgritypeError::MissingColumn {
                    column: name.to_string(),
                    available: headers.clone(),
                })
        };

        let numeric_idx: Vec<usize> = NUMERIC_COLUMNS
            .iter()
            .map(|name| column_index(name))
            .collect::<Result<_>>()?;
        let categorical_idx: Vec<usize> = CATEGORICAL_COLUMNS
            .iter()
            .map(|name| column_index(name))
            .collect::<Result<_>>()?;
        let label_idx = column_index(LABEL_COLUMN)?;

        let mut numeric_rows: Vec<Vec<f32>> = Vec::new();
        let mut categorical_rows: Vec<Vec<String>> = Vec::new();
        let mut raw_labels: Vec<String> = Vec::new();
        let mut dropped_unlabeled = 0usize;

        for (record_no, record) in csv_reader.records().enumerate() {
            let record = record?;

            let label = record.get(label_idx).unwrap_or("").to_string();
            if label.is_empty() {
                dropped_unlabeled += 1;
                continue;
            }

            let mut numeric = Vec::with_capacity(numeric_idx.len());
            for (col_pos, &idx) in numeric_idx.iter().enumerate() {
                let cell = record.get(idx).unwrap_or("");
                if cell.is_empty() {
                    // No imputation: NaN flows through to the scaler.
                    numeric.push(f32::NAN);
                    continue;
                }
                let value: f32 = cell.parse().map_err(|_| AgritypeError::MalformedValue {
                    column: NUMERIC_COLUMNS[col_pos].to_string(),
                    record: record_no + 1,
                    value: cell.to_string(),
                })?;
                numeric.push(value);
            }

            let categorical: Vec<String> = categorical_idx
                .iter()
                .map(|&idx| record.get(idx).unwrap_or("").to_string())
                .collect();

            numeric_rows.push(numeric);
            categorical_rows.push(categorical);
            raw_labels.push(label);
        }

        if raw_labels.is_empty() {
            return Err(AgritypeError::empty_input("no labeled rows in dataset"));
        }

        // Rare-label filter: keep K-Types with at least MIN_CLASS_SUPPORT rows.
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for label in &raw_labels {
            *counts.entry(label.as_str()).or_insert(0) += 1;
        }
        let dropped_rare_classes: Vec<String> = counts
            .iter()
            .filter(|(_, &n)| n < MIN_CLASS_SUPPORT)
            .map(|(label, _)| (*label).to_string())
            .collect();
        let classes: Vec<String> = counts
            .iter()
            .filter(|(_, &n)| n >= MIN_CLASS_SUPPORT)
            .map(|(label, _)| (*label).to_string())
            .collect();

        if classes.is_empty() {
            return Err(AgritypeError::empty_input(
                "no K-Type has enough supporting records",
            ));
        }

        let class_index: BTreeMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let keep: Vec<usize> = raw_labels
            .iter()
            .enumerate()
            .filter(|(_, label)| class_index.contains_key(label.as_str()))
            .map(|(i, _)| i)
            .collect();
        let dropped_rare_rows = raw_labels.len() - keep.len();

        info!(
            rows_kept = keep.len(),
            dropped_unlabeled,
            dropped_rare_rows,
            dropped_rare_classes = dropped_rare_classes.len(),
            classes = classes.len(),
            "Dataset prepared"
        );

        let labels: Vec<usize> = keep
            .iter()
            .filter_map(|&i| class_index.get(raw_labels[i].as_str()).copied())
            .collect();

        let mut numeric_data = Vec::with_capacity(keep.len() * NUMERIC_COLUMNS.len());
        for &i in &keep {
            numeric_data.extend_from_slice(&numeric_rows[i]);
        }
        let numeric = Matrix::from_vec(keep.len(), NUMERIC_COLUMNS.len(), numeric_data)
            .map_err(AgritypeError::from)?;

        let categorical: Vec<Vec<String>> = (0..CATEGORICAL_COLUMNS.len())
            .map(|col| keep.iter().map(|&i| categorical_rows[i][col].clone()).collect())
            .collect();

        let features = FeatureTable::new(
            numeric,
            categorical,
            NUMERIC_COLUMNS.iter().map(|s| (*s).to_string()).collect(),
            CATEGORICAL_COLUMNS.iter().map(|s| (*s).to_string()).collect(),
        )?;

        Ok(Self {
            features,
            labels,
            classes,
            dropped_unlabeled,
            dropped_rare_rows,
            dropped_rare_classes,
        })
    }

    /// Returns the number of retained rows.
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "region,filiere,sau,umo,ugb,nb_vl,surface_sfp,surface_herbe_pp,surface_herbe_pt,surface_culture,ktype";

    fn row(region: &str, filiere: &str, base: f32, ktype: &str) -> String {
        format!(
            "{region},{filiere},{},{},{},{},{},{},{},{},{ktype}",
            80.0 + base,
            1.5,
            60.0 + base,
            40.0,
            50.0 + base,
            20.0,
            10.0,
            15.0
        )
    }

    fn csv_with_counts(counts: &[(&str, usize)]) -> String {
        let mut out = String::from(HEADER);
        out.push('\n');
        for (i, (ktype, n)) in counts.iter().enumerate() {
            for j in 0..*n {
                out.push_str(&row("Bretagne", "Bovins Lait", (i * 10 + j) as f32, ktype));
                out.push('\n');
            }
        }
        out
    }

    #[test]
    fn test_load_basic() {
        let csv = csv_with_counts(&[("Laitier Herbager", 6), ("Céréalier Intensif", 5)]);
        let ds = FarmDataset::from_reader(csv.as_bytes()).expect("load");
        assert_eq!(ds.n_rows(), 11);
        assert_eq!(ds.classes.len(), 2);
        // Vocabulary sorted: Céréalier before Laitier.
        assert_eq!(ds.classes[0], "Céréalier Intensif");
        assert_eq!(ds.features.numeric().shape(), (11, 8));
        assert_eq!(ds.features.categorical().len(), 2);
    }

    #[test]
    fn test_missing_label_column_lists_available() {
        let csv = "region,sau\nBretagne,80\n";
        let err = FarmDataset::from_reader(csv.as_bytes()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("filiere") || msg.contains("Missing column"));
        assert!(msg.contains("region"));
    }

    #[test]
    fn test_rare_label_filter() {
        let csv = csv_with_counts(&[("Commun", 7), ("Rare", 3)]);
        let ds = FarmDataset::from_reader(csv.as_bytes()).expect("load");
        assert_eq!(ds.n_rows(), 7);
        assert_eq!(ds.classes, vec!["Commun".to_string()]);
        assert_eq!(ds.dropped_rare_rows, 3);
        assert_eq!(ds.dropped_rare_classes, vec!["Rare".to_string()]);
    }

    #[test]
    fn test_unlabeled_rows_dropped() {
        let mut csv = csv_with_counts(&[("Commun", 5)]);
        csv.push_str(&row("Bretagne", "Bovins Lait", 1.0, ""));
        csv.push('\n');
        let ds = FarmDataset::from_reader(csv.as_bytes()).expect("load");
        assert_eq!(ds.n_rows(), 5);
        assert_eq!(ds.dropped_unlabeled, 1);
    }

    #[test]
    fn test_malformed_numeric_cell_fails() {
        let mut csv = String::from(HEADER);
        csv.push('\n');
        csv.push_str("Bretagne,Bovins Lait,abc,1.5,60,40,50,20,10,15,Laitier\n");
        let err = FarmDataset::from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, AgritypeError::MalformedValue { .. }));
        assert!(err.to_string().contains("sau"));
    }

    #[test]
    fn test_empty_numeric_cell_becomes_nan() {
        let mut csv = String::from(HEADER);
        csv.push('\n');
        for i in 0..5 {
            csv.push_str(&format!(
                "Bretagne,Bovins Lait,,1.5,{},40,50,20,10,15,Laitier\n",
                60 + i
            ));
        }
        let ds = FarmDataset::from_reader(csv.as_bytes()).expect("load");
        assert!(ds.features.numeric().get(0, 0).is_nan());
    }

    #[test]
    fn test_labels_match_row_order() {
        let csv = csv_with_counts(&[("B_type", 5), ("A_type", 5)]);
        let ds = FarmDataset::from_reader(csv.as_bytes()).expect("load");
        // First 5 rows are B_type which sorts after A_type.
        assert_eq!(ds.classes, vec!["A_type".to_string(), "B_type".to_string()]);
        assert_eq!(ds.labels[0], 1);
        assert_eq!(ds.labels[9], 0);
    }

    #[test]
    fn test_take_rows_keeps_blocks_aligned() {
        let csv = csv_with_counts(&[("Commun", 6)]);
        let ds = FarmDataset::from_reader(csv.as_bytes()).expect("load");
        let sub = ds.features.take_rows(&[4, 0]);
        assert_eq!(sub.n_rows(), 2);
        assert_eq!(sub.numeric().get(0, 0), ds.features.numeric().get(4, 0));
        assert_eq!(sub.categorical()[0][1], ds.features.categorical()[0][0]);
    }

    #[test]
    fn test_single_row_schema_check() {
        let numeric = vec![80.0; 8];
        let categorical = vec!["Bretagne".to_string(), "Bovins Lait".to_string()];
        let table = FeatureTable::single_row(&numeric, &categorical).expect("single row");
        assert_eq!(table.n_rows(), 1);
        assert!(FeatureTable::single_row(&numeric[..3], &categorical).is_err());
    }
}
