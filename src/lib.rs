//! Handwritten digit classification in pure Rust
//!
//! Loads labelled pixel rows from CSV, trains a maximum-entropy (multinomial
//! logistic regression) classifier with Stochastic Dual Coordinate Ascent,
//! evaluates it and serves single-row predictions.

pub mod api;
pub mod cache;
pub mod core;
pub mod data;
pub mod metrics;
pub mod optimizer;
pub mod persistence;
pub mod pipeline;
pub mod solver;
pub mod transform;
pub mod utils;

// Re-export main types for convenience
pub use crate::api::{ModelInfo, PredictionEngine, SdcaMaximumEntropy, TrainedModel};
pub use crate::cache::{CacheCheckpoint, CacheStats};
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{DigitError, Result};
pub use crate::data::{train_test_split, DigitDataset, TrainTestSplit};
pub use crate::metrics::{ConfusionMatrix, MulticlassMetrics};
pub use crate::optimizer::{LinearClassifier, MaxEntropyOptimizer};
pub use crate::pipeline::{Pipeline, PipelineConfig, PipelineReport};
pub use crate::transform::FeatureTransform;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
