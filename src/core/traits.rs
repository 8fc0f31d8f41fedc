//! Core traits for digit classification

use crate::core::{Digit, DigitPrediction};
use std::borrow::Cow;

/// Labelled digit collection with random access
pub trait Dataset {
    /// Number of digits in the dataset
    fn len(&self) -> usize;

    /// Number of pixel values per digit
    fn dim(&self) -> usize;

    /// Number of classes labels are drawn from
    fn num_classes(&self) -> usize;

    /// Get a single digit by index
    ///
    /// # Panics
    /// Panics if index >= len()
    fn get_digit(&self, i: usize) -> &Digit;

    /// Get all labels as a vector
    fn get_labels(&self) -> Vec<usize> {
        (0..self.len()).map(|i| self.get_digit(i).label).collect()
    }

    /// Check if the dataset is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Training rows as seen by the solver: transformed feature vectors and labels
pub trait FeatureSource {
    /// Number of rows
    fn len(&self) -> usize;

    /// Feature dimensionality
    fn dim(&self) -> usize;

    /// Label of row `i`
    fn label(&self, i: usize) -> usize;

    /// Feature vector of row `i`
    fn features(&self, i: usize) -> Cow<'_, [f64]>;

    /// Squared L2 norm of row `i`
    fn norm_squared(&self, i: usize) -> f64 {
        self.features(i).iter().map(|v| v * v).sum()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fitted multiclass model operating on transformed feature vectors
pub trait Classifier {
    /// Per-class probabilities for one feature vector
    fn predict_features(&self, features: &[f64]) -> DigitPrediction;

    /// Number of classes scored
    fn num_classes(&self) -> usize;

    /// Expected feature dimensionality
    fn dim(&self) -> usize;
}
