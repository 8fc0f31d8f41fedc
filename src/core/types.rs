//! Core type definitions for digit classification

use crate::core::{DigitError, Result};
use crate::utils::scaling::ScalingMethod;
use serde::{Deserialize, Serialize};

/// Number of pixel columns in a 28x28 digit image
pub const PIXEL_COUNT: usize = 784;

/// Number of digit classes (0-9)
pub const DIGIT_CLASSES: usize = 10;

/// One handwritten digit: pixel intensities plus its class label
#[derive(Clone, Debug, PartialEq)]
pub struct Digit {
    /// Pixel intensities in column order
    pub pixels: Vec<f32>,
    /// Class label in `[0, num_classes)`
    pub label: usize,
}

impl Digit {
    /// Create a new digit
    pub fn new(pixels: Vec<f32>, label: usize) -> Self {
        Self { pixels, label }
    }

    /// Number of pixel values
    pub fn dim(&self) -> usize {
        self.pixels.len()
    }
}

/// Typed mapping of logical column roles to CSV column positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitSchema {
    /// Column holding the label ("Number")
    pub label_column: usize,
    /// First column of the pixel vector ("PixelValues")
    pub feature_start: usize,
    /// Width of the pixel vector
    pub feature_count: usize,
    /// Number of classes the label may take
    pub num_classes: usize,
}

impl Default for DigitSchema {
    fn default() -> Self {
        Self {
            label_column: 0,
            feature_start: 1,
            feature_count: PIXEL_COUNT,
            num_classes: DIGIT_CLASSES,
        }
    }
}

impl DigitSchema {
    /// Label-first schema with the given feature width and class count
    pub fn new(feature_count: usize, num_classes: usize) -> Self {
        Self {
            label_column: 0,
            feature_start: 1,
            feature_count,
            num_classes,
        }
    }

    /// Total number of columns a row must have
    pub fn columns(&self) -> usize {
        (self.label_column + 1).max(self.feature_start + self.feature_count)
    }

    /// Check that the roles are consistent
    pub fn validate(&self) -> Result<()> {
        if self.feature_count == 0 {
            return Err(DigitError::InvalidSchema(
                "feature_count must be positive".to_string(),
            ));
        }
        if self.num_classes < 2 {
            return Err(DigitError::InvalidSchema(format!(
                "num_classes must be at least 2, got {}",
                self.num_classes
            )));
        }
        let features = self.feature_start..self.feature_start + self.feature_count;
        if features.contains(&self.label_column) {
            return Err(DigitError::InvalidSchema(format!(
                "label column {} overlaps feature columns {}..{}",
                self.label_column, features.start, features.end
            )));
        }
        Ok(())
    }
}

/// Per-class probability scores for one digit
#[derive(Debug, Clone, PartialEq)]
pub struct DigitPrediction {
    /// Probability for each class, summing to 1
    pub scores: Vec<f64>,
    /// Class with the highest score
    pub label: usize,
}

impl DigitPrediction {
    /// Build a prediction from a probability vector, picking the arg-max label
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let label = argmax(&scores);
        Self { scores, label }
    }

    /// Probability of the predicted class
    pub fn confidence(&self) -> f64 {
        self.scores.get(self.label).copied().unwrap_or(0.0)
    }

    /// Number of classes scored
    pub fn num_classes(&self) -> usize {
        self.scores.len()
    }
}

/// Index of the largest value; ties resolve to the lowest index
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (k, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = k;
        }
    }
    best
}

/// Result of the SDCA optimization
#[derive(Debug, Clone)]
pub struct TrainingResult {
    /// Class-major weights: row `k` holds the `dim` weights of class `k`
    pub weights: Vec<f64>,
    /// Bias per class
    pub bias: Vec<f64>,
    /// Feature dimensionality
    pub dim: usize,
    /// Epochs performed
    pub epochs: usize,
    /// Final primal objective value
    pub primal_objective: f64,
    /// Final duality gap (primal minus dual)
    pub duality_gap: f64,
    /// Whether the relative gap fell below the tolerance
    pub converged: bool,
}

/// Configuration for the SDCA maximum-entropy trainer
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// L2 regularization strength (lambda)
    pub l2: f64,
    /// Relative duality gap at which training stops
    pub tolerance: f64,
    /// Maximum number of passes over the training data
    pub max_epochs: usize,
    /// Visit rows in a shuffled order each epoch
    pub shuffle: bool,
    /// Seed for the visiting order; `None` draws from entropy
    pub seed: Option<u64>,
    /// Materialize transformed rows once before training
    pub cache: bool,
    /// Feature scaling fitted on the training rows
    pub scaling: Option<ScalingMethod>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            l2: 1e-4,
            tolerance: 0.01,
            max_epochs: 30,
            shuffle: true,
            seed: None,
            cache: true,
            scaling: Some(ScalingMethod::UnitScale),
        }
    }
}

impl TrainerConfig {
    /// Check parameter ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.l2 > 0.0 && self.l2.is_finite()) {
            return Err(DigitError::InvalidParameter(format!(
                "l2 must be positive, got {}",
                self.l2
            )));
        }
        if !(self.tolerance >= 0.0) {
            return Err(DigitError::InvalidParameter(format!(
                "tolerance must be non-negative, got {}",
                self.tolerance
            )));
        }
        if self.max_epochs == 0 {
            return Err(DigitError::InvalidParameter(
                "max_epochs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
