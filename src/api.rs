//! High-level API for training, evaluating and serving digit classifiers
//!
//! This module provides a user-friendly interface over the transform, the
//! SDCA trainer, the evaluator and single-row prediction.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rdigits::api::SdcaMaximumEntropy;
//! use rdigits::data::{train_test_split, DigitDataset};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let dataset = DigitDataset::from_file("handwritten_digits_large.csv")?;
//! let split = train_test_split(&dataset, 0.2, Some(1))?;
//!
//! let model = SdcaMaximumEntropy::new()
//!     .with_l2(1e-4)
//!     .with_max_epochs(20)
//!     .train(&split.train)?;
//!
//! let metrics = model.evaluate(&split.test)?;
//! println!("Micro accuracy: {:.3}", metrics.micro_accuracy);
//!
//! let mut engine = model.prediction_engine();
//! let prediction = engine.predict(&dataset.digits()[5])?;
//! println!("Predicted {}", prediction.label);
//! # Ok(())
//! # }
//! ```

use crate::core::{
    Classifier, Dataset, Digit, DigitError, DigitPrediction, DigitSchema, Result, TrainerConfig,
};
use crate::data::{train_test_split, DigitDataset};
use crate::metrics::{MulticlassMetrics, DEFAULT_TOP_K};
use crate::optimizer::{LinearClassifier, MaxEntropyOptimizer};
use crate::transform::FeatureTransform;
use crate::utils::scaling::ScalingMethod;
use crate::utils::validation;
use log::{info, warn};
use std::path::Path;

/// SDCA maximum-entropy trainer with builder-style configuration
#[derive(Debug, Clone, Default)]
pub struct SdcaMaximumEntropy {
    config: TrainerConfig,
}

impl SdcaMaximumEntropy {
    /// Create a trainer with default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trainer from an explicit configuration
    pub fn with_config(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Set L2 regularization strength
    pub fn with_l2(mut self, l2: f64) -> Self {
        self.config.l2 = l2;
        self
    }

    /// Set relative duality gap tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    /// Set maximum number of epochs
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.config.max_epochs = max_epochs;
        self
    }

    /// Fix the seed of the row visiting order
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// Enable or disable the cache checkpoint
    pub fn with_cache(mut self, cache: bool) -> Self {
        self.config.cache = cache;
        self
    }

    /// Set feature scaling (`None` feeds raw pixel values)
    pub fn with_scaling(mut self, scaling: Option<ScalingMethod>) -> Self {
        self.config.scaling = scaling;
        self
    }

    /// Enable or disable per-epoch shuffling
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.config.shuffle = shuffle;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Train on a dataset
    pub fn train(&self, dataset: &DigitDataset) -> Result<TrainedModel> {
        self.config.validate()?;
        if dataset.is_empty() {
            return Err(DigitError::EmptyDataset);
        }
        validation::validate_labels(dataset).map_err(DigitError::InvalidParameter)?;

        if validation::classes_present(dataset) < 2 {
            warn!("Training data contains fewer than 2 distinct labels");
        }

        info!(
            "Training on {} digits with {} features",
            dataset.len(),
            dataset.dim()
        );

        let transform = FeatureTransform::fit(dataset, self.config.scaling);
        let classifier = MaxEntropyOptimizer::new(self.config.clone()).train(dataset, &transform)?;

        Ok(TrainedModel {
            transform,
            classifier,
            schema: *dataset.schema(),
        })
    }

    /// Train from a CSV file with the default digit schema
    pub fn train_from_csv<P: AsRef<Path>>(&self, path: P) -> Result<TrainedModel> {
        let dataset = DigitDataset::from_file(path)?;
        self.train(&dataset)
    }
}

/// Fitted feature transform plus linear classifier
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    transform: FeatureTransform,
    classifier: LinearClassifier,
    schema: DigitSchema,
}

impl TrainedModel {
    /// Assemble a model from its parts, checking that they agree
    pub fn from_parts(
        transform: FeatureTransform,
        classifier: LinearClassifier,
        schema: DigitSchema,
    ) -> Result<Self> {
        schema.validate()?;
        if transform.dim() != classifier.dim() || schema.feature_count != classifier.dim() {
            return Err(DigitError::DimensionMismatch {
                expected: schema.feature_count,
                actual: classifier.dim(),
            });
        }
        if schema.num_classes != classifier.num_classes() {
            return Err(DigitError::DimensionMismatch {
                expected: schema.num_classes,
                actual: classifier.num_classes(),
            });
        }
        Ok(Self {
            transform,
            classifier,
            schema,
        })
    }

    /// Predict a single digit
    pub fn predict(&self, digit: &Digit) -> Result<DigitPrediction> {
        let features = self.transform.apply(&digit.pixels)?;
        Ok(self.classifier.predict_features(&features))
    }

    /// Predict every digit of a dataset
    pub fn predict_dataset<D: Dataset + ?Sized>(&self, dataset: &D) -> Result<Vec<DigitPrediction>> {
        let mut engine = self.prediction_engine();
        (0..dataset.len())
            .map(|i| engine.predict(dataset.get_digit(i)))
            .collect()
    }

    /// Evaluate on a labelled dataset with the default top-K
    pub fn evaluate<D: Dataset + ?Sized>(&self, dataset: &D) -> Result<MulticlassMetrics> {
        self.evaluate_with_top_k(dataset, DEFAULT_TOP_K)
    }

    /// Evaluate on a labelled dataset
    pub fn evaluate_with_top_k<D: Dataset + ?Sized>(
        &self,
        dataset: &D,
        top_k: usize,
    ) -> Result<MulticlassMetrics> {
        if dataset.is_empty() {
            return Err(DigitError::EmptyDataset);
        }
        if dataset.num_classes() != self.classifier.num_classes() {
            return Err(DigitError::DimensionMismatch {
                expected: self.classifier.num_classes(),
                actual: dataset.num_classes(),
            });
        }
        let predictions = self.predict_dataset(dataset)?;
        MulticlassMetrics::compute(
            &dataset.get_labels(),
            &predictions,
            self.classifier.num_classes(),
            top_k.min(self.classifier.num_classes()),
        )
    }

    /// Evaluate on a CSV file
    pub fn evaluate_from_csv<P: AsRef<Path>>(&self, path: P) -> Result<MulticlassMetrics> {
        let dataset = DigitDataset::from_file_with_schema(path, self.schema)?;
        self.evaluate(&dataset)
    }

    /// Single-row inference interface
    pub fn prediction_engine(&self) -> PredictionEngine<'_> {
        PredictionEngine {
            model: self,
            buffer: Vec::with_capacity(self.transform.dim()),
        }
    }

    /// Get model information
    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            num_classes: self.classifier.num_classes(),
            dim: self.classifier.dim(),
            epochs: self.classifier.epochs(),
            duality_gap: self.classifier.duality_gap(),
            scaling: self.transform.scaling().map(|p| p.method),
        }
    }

    pub fn transform(&self) -> &FeatureTransform {
        &self.transform
    }

    pub fn classifier(&self) -> &LinearClassifier {
        &self.classifier
    }

    pub fn schema(&self) -> &DigitSchema {
        &self.schema
    }
}

/// Reusable single-row predictor
///
/// Keeps one feature buffer alive across calls so repeated predictions do
/// not reallocate.
pub struct PredictionEngine<'a> {
    model: &'a TrainedModel,
    buffer: Vec<f64>,
}

impl PredictionEngine<'_> {
    /// Per-class probabilities for one digit
    pub fn predict(&mut self, digit: &Digit) -> Result<DigitPrediction> {
        self.model.transform.apply_into(&digit.pixels, &mut self.buffer)?;
        Ok(self.model.classifier.predict_features(&self.buffer))
    }
}

/// Model information
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub num_classes: usize,
    pub dim: usize,
    pub epochs: usize,
    pub duality_gap: Option<f64>,
    pub scaling: Option<ScalingMethod>,
}

/// Convenience functions for quick operations
pub mod quick {
    use super::*;

    /// Train with default parameters on a CSV file
    pub fn train_csv<P: AsRef<Path>>(path: P) -> Result<TrainedModel> {
        SdcaMaximumEntropy::new().train_from_csv(path)
    }

    /// Load, split, train and evaluate in one call
    pub fn evaluate_split<P: AsRef<Path>>(
        path: P,
        test_fraction: f64,
        seed: Option<u64>,
    ) -> Result<MulticlassMetrics> {
        let dataset = DigitDataset::from_file(path)?;
        let split = train_test_split(&dataset, test_fraction, seed)?;
        let mut trainer = SdcaMaximumEntropy::new();
        if let Some(seed) = seed {
            trainer = trainer.with_seed(seed);
        }
        let model = trainer.train(&split.train)?;
        model.evaluate(&split.test)
    }
}
