//! Serving-side model handle.
//!
//! The artifact is loaded once into a [`ModelHandle`] that callers pass
//! around explicitly. There is no global model state.

use crate::dataset::FeatureTable;
use crate::error::Result;
use crate::pipeline::KTypeModel;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single farm described with the training-time fields.
///
/// Field names match the training CSV columns so a serving request maps
/// one-to-one onto a feature-table row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmInput {
    /// Région de l'exploitation.
    pub region: String,
    /// Filière (ex: "Bovins Lait").
    pub filiere: String,
    /// Surface agricole utile (ha).
    pub sau: f32,
    /// Unités de main-d'œuvre.
    pub umo: f32,
    /// Unités gros bétail.
    pub ugb: f32,
    /// Nombre de vaches laitières.
    pub nb_vl: f32,
    /// Surface fourragère principale (ha).
    pub surface_sfp: f32,
    /// Surface en herbe, prairies permanentes (ha).
    pub surface_herbe_pp: f32,
    /// Surface en herbe, prairies temporaires (ha).
    pub surface_herbe_pt: f32,
    /// Surface en cultures (ha).
    pub surface_culture: f32,
}

impl FarmInput {
    /// Builds the one-row feature table for this farm, in training column
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema doesn't line up (cannot happen with
    /// the fixed field set, but kept in the signature for uniformity).
    pub fn to_feature_table(&self) -> Result<FeatureTable> {
        FeatureTable::single_row(
            &[
                self.sau,
                self.umo,
                self.ugb,
                self.nb_vl,
                self.surface_sfp,
                self.surface_herbe_pp,
                self.surface_herbe_pt,
                self.surface_culture,
            ],
            &[self.region.clone(), self.filiere.clone()],
        )
    }
}

/// Read-only handle over a loaded model artifact.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    model: KTypeModel,
}

impl ModelHandle {
    /// Loads a model artifact from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the artifact is missing, corrupt, or has an
    /// incompatible version.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            model: KTypeModel::load(path)?,
        })
    }

    /// Wraps an already-built model (used by the trainer and tests).
    #[must_use]
    pub fn from_model(model: KTypeModel) -> Self {
        Self { model }
    }

    /// Predicts the K-Type for one farm.
    ///
    /// # Errors
    ///
    /// Returns an error if the farm cannot be encoded or prediction fails.
    pub fn predict(&self, farm: &FarmInput) -> Result<String> {
        let table = farm.to_feature_table()?;
        let mut predictions = self.model.predict(&table)?;
        // predict on a one-row table yields exactly one label
        Ok(predictions.remove(0))
    }

    /// Returns the K-Type vocabulary the model predicts over.
    #[must_use]
    pub fn classes(&self) -> &[String] {
        self.model.classes()
    }
}

#[cfg(test)]
pub(crate) fn sample_farm() -> FarmInput {
    FarmInput {
        region: "Bretagne".to_string(),
        filiere: "Bovins Lait".to_string(),
        sau: 85.0,
        umo: 1.8,
        ugb: 70.0,
        nb_vl: 45.0,
        surface_sfp: 60.0,
        surface_herbe_pp: 25.0,
        surface_herbe_pt: 15.0,
        surface_culture: 20.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_feature_table_column_order() {
        let farm = sample_farm();
        let table = farm.to_feature_table().expect("table");
        assert_eq!(table.n_rows(), 1);
        assert_eq!(table.numeric().get(0, 0), 85.0);
        assert_eq!(table.numeric().get(0, 7), 20.0);
        assert_eq!(table.categorical()[0][0], "Bretagne");
        assert_eq!(table.categorical()[1][0], "Bovins Lait");
    }

    #[test]
    fn test_farm_input_json_roundtrip() {
        let farm = sample_farm();
        let json = serde_json::to_string(&farm).unwrap();
        let back: FarmInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back.region, farm.region);
        assert_eq!(back.sau, farm.sau);
    }

    #[test]
    fn test_load_missing_artifact_errors() {
        assert!(ModelHandle::load("/nonexistent/model.bin").is_err());
    }
}
