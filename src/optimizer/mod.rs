//! High-level training interface
//!
//! This module ties the feature transform, the optional cache checkpoint and
//! the SDCA solver together and produces a linear multiclass classifier.

use crate::cache::CacheCheckpoint;
use crate::core::{
    Classifier, Dataset, DigitError, DigitPrediction, Result, TrainerConfig, TrainingResult,
};
use crate::solver::{softmax_into, SdcaSolver};
use crate::transform::FeatureTransform;
use log::info;

/// Trainer that fits a [`LinearClassifier`] with SDCA
pub struct MaxEntropyOptimizer {
    config: TrainerConfig,
}

impl MaxEntropyOptimizer {
    /// Create a new optimizer with the given configuration
    pub fn new(config: TrainerConfig) -> Self {
        Self { config }
    }

    /// Fit a classifier on already-transformed rows described by `transform`
    ///
    /// With `config.cache` set the transformed rows are materialized once;
    /// otherwise every epoch re-runs the transform.
    pub fn train<D: Dataset + ?Sized>(
        &self,
        dataset: &D,
        transform: &FeatureTransform,
    ) -> Result<LinearClassifier> {
        if dataset.is_empty() {
            return Err(DigitError::EmptyDataset);
        }

        let solver = SdcaSolver::new(self.config.clone(), dataset.num_classes());
        let result = if self.config.cache {
            let checkpoint = CacheCheckpoint::materialize(dataset, transform)?;
            solver.solve(&checkpoint)?
        } else {
            solver.solve(&transform.view(dataset)?)?
        };

        info!(
            "SDCA finished after {} epochs (converged: {}, duality gap {:.3e})",
            result.epochs, result.converged, result.duality_gap
        );

        LinearClassifier::from_result(result, dataset.num_classes())
    }

    /// Get the optimizer configuration
    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }
}

/// Linear multiclass model: softmax(W x + b)
#[derive(Debug, Clone, PartialEq)]
pub struct LinearClassifier {
    weights: Vec<f64>,
    bias: Vec<f64>,
    dim: usize,
    num_classes: usize,
    epochs: usize,
    duality_gap: Option<f64>,
}

impl LinearClassifier {
    /// Wrap a solver result
    pub(crate) fn from_result(result: TrainingResult, num_classes: usize) -> Result<Self> {
        let mut model = Self::from_parts(result.weights, result.bias, result.dim, num_classes)?;
        model.epochs = result.epochs;
        model.duality_gap = Some(result.duality_gap);
        Ok(model)
    }

    /// Build from raw class-major weights and biases, checking shapes
    pub fn from_parts(
        weights: Vec<f64>,
        bias: Vec<f64>,
        dim: usize,
        num_classes: usize,
    ) -> Result<Self> {
        if bias.len() != num_classes {
            return Err(DigitError::DimensionMismatch {
                expected: num_classes,
                actual: bias.len(),
            });
        }
        if weights.len() != num_classes * dim {
            return Err(DigitError::DimensionMismatch {
                expected: num_classes * dim,
                actual: weights.len(),
            });
        }
        Ok(Self {
            weights,
            bias,
            dim,
            num_classes,
            epochs: 0,
            duality_gap: None,
        })
    }

    /// Raw linear scores `W x + b`
    pub fn decision_function(&self, features: &[f64]) -> Vec<f64> {
        (0..self.num_classes)
            .map(|k| {
                let w = self.class_weights(k);
                w.iter().zip(features).map(|(w, x)| w * x).sum::<f64>() + self.bias[k]
            })
            .collect()
    }

    /// Weights of class `k`
    pub fn class_weights(&self, k: usize) -> &[f64] {
        &self.weights[k * self.dim..(k + 1) * self.dim]
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    /// Epochs the solver ran; 0 for models rebuilt from parts
    pub fn epochs(&self) -> usize {
        self.epochs
    }

    /// Final duality gap; `None` for models rebuilt from parts
    pub fn duality_gap(&self) -> Option<f64> {
        self.duality_gap
    }

    pub(crate) fn set_training_info(&mut self, epochs: usize, duality_gap: Option<f64>) {
        self.epochs = epochs;
        self.duality_gap = duality_gap;
    }
}

impl Classifier for LinearClassifier {
    fn predict_features(&self, features: &[f64]) -> DigitPrediction {
        debug_assert_eq!(features.len(), self.dim);
        let scores = self.decision_function(features);
        let mut probs = vec![0.0; self.num_classes];
        softmax_into(&scores, &mut probs);
        DigitPrediction::from_scores(probs)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn dim(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Digit, DigitSchema};
    use crate::data::DigitDataset;
    use approx::assert_relative_eq;

    fn toy_dataset() -> DigitDataset {
        let mut digits = Vec::new();
        for i in 0..10 {
            let v = 200.0 + i as f32;
            digits.push(Digit::new(vec![v, 0.0, 10.0], 0));
            digits.push(Digit::new(vec![0.0, v, 10.0], 1));
        }
        DigitDataset::from_digits(digits, DigitSchema::new(3, 2))
    }

    fn config(cache: bool) -> TrainerConfig {
        TrainerConfig {
            l2: 1e-2,
            max_epochs: 50,
            seed: Some(5),
            cache,
            ..TrainerConfig::default()
        }
    }

    #[test]
    fn test_train_and_predict() {
        let data = toy_dataset();
        let transform = FeatureTransform::fit(&data, config(true).scaling);
        let model = MaxEntropyOptimizer::new(config(true))
            .train(&data, &transform)
            .expect("Training should succeed");

        assert_eq!(model.num_classes(), 2);
        assert_eq!(model.dim(), 3);
        assert!(model.epochs() >= 1);

        for digit in data.digits() {
            let features = transform.apply(&digit.pixels).unwrap();
            let prediction = model.predict_features(&features);
            assert_eq!(prediction.label, digit.label);
            assert_relative_eq!(prediction.scores.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_cached_and_uncached_agree() {
        let data = toy_dataset();
        let transform = FeatureTransform::fit(&data, config(true).scaling);

        let cached = MaxEntropyOptimizer::new(config(true))
            .train(&data, &transform)
            .unwrap();
        let uncached = MaxEntropyOptimizer::new(config(false))
            .train(&data, &transform)
            .unwrap();

        assert_eq!(cached.epochs(), uncached.epochs());
        for (a, b) in cached.weights().iter().zip(uncached.weights()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
        for (a, b) in cached.bias().iter().zip(uncached.bias()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_empty_dataset_fails() {
        let data = DigitDataset::from_digits(vec![], DigitSchema::new(3, 2));
        let transform = FeatureTransform::identity(3);
        let result = MaxEntropyOptimizer::new(config(true)).train(&data, &transform);
        assert!(matches!(result, Err(DigitError::EmptyDataset)));
    }

    #[test]
    fn test_from_parts_shape_checks() {
        assert!(LinearClassifier::from_parts(vec![0.0; 6], vec![0.0; 2], 3, 2).is_ok());
        assert!(LinearClassifier::from_parts(vec![0.0; 5], vec![0.0; 2], 3, 2).is_err());
        assert!(LinearClassifier::from_parts(vec![0.0; 6], vec![0.0; 3], 3, 2).is_err());
    }

    #[test]
    fn test_decision_function() {
        let model =
            LinearClassifier::from_parts(vec![1.0, 0.0, 0.0, 2.0], vec![0.5, -0.5], 2, 2).unwrap();
        assert_eq!(model.decision_function(&[1.0, 1.0]), vec![1.5, 1.5]);
        assert_eq!(model.class_weights(1), &[0.0, 2.0]);

        let prediction = model.predict_features(&[0.0, 3.0]);
        assert_eq!(prediction.label, 1);
        assert!(prediction.confidence() > 0.99);
    }
}
