//! Agritype: K-Type farm classification in pure Rust.
//!
//! Trains a supervised classifier that assigns French farm accounting
//! records to K-Type archetypes. The pipeline loads a reference CSV,
//! standardizes and one-hot encodes the features, runs a k-means
//! diagnostic against the expert taxonomy, grid-searches random-forest
//! and gradient-boosting candidates with cross-validation, and persists
//! the winner as a self-contained artifact for serving.
//!
//! # Quick start
//!
//! ```ignore
//! use agritype::config::TrainConfig;
//! use agritype::pipeline::train;
//!
//! let config = TrainConfig::new("data/farms.csv", "models/ktype.bin");
//! let outcome = train(&config)?;
//! println!("test accuracy: {:.3}", outcome.report.test_accuracy);
//! ```

pub mod cluster;
pub mod config;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod model_selection;
pub mod pipeline;
pub mod prelude;
pub mod preprocessing;
pub mod primitives;
pub mod scoring;
pub mod serve;
pub mod traits;
pub mod tree;

pub use error::{AgritypeError, Result};
