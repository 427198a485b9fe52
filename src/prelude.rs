//! Convenience re-exports of the most commonly used types.

pub use crate::cluster::{ContingencyTable, KMeans};
pub use crate::config::TrainConfig;
pub use crate::dataset::{FarmDataset, FeatureTable};
pub use crate::error::{AgritypeError, Result};
pub use crate::metrics::{accuracy, ClassificationReport};
pub use crate::model_selection::{
    cross_validate, cross_validate_table, grid_search, train_test_split, CandidateParams, KFold,
};
pub use crate::pipeline::{train, KTypeModel, TrainReport};
pub use crate::preprocessing::{OneHotEncoder, StandardScaler, TablePreprocessor};
pub use crate::primitives::Matrix;
pub use crate::scoring::{classify_with_fallback, HeuristicStrategy, ModelStrategy, ScoringStrategy};
pub use crate::serve::{FarmInput, ModelHandle};
pub use crate::traits::{Classifier, Transformer, UnsupervisedEstimator};
pub use crate::tree::{DecisionTreeClassifier, GradientBoostingClassifier, RandomForestClassifier};
