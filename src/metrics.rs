//! Multiclass evaluation metrics
//!
//! Aggregates predictions against true labels into micro/macro accuracy,
//! log-loss, log-loss reduction over the label prior, per-class log-loss,
//! top-K accuracy and a confusion matrix.

use crate::core::{DigitError, DigitPrediction, Result};
use std::fmt;

/// Probabilities are clamped to this floor before taking the log
pub const PROBABILITY_EPSILON: f64 = 1e-15;

/// Default K for top-K accuracy
pub const DEFAULT_TOP_K: usize = 5;

/// Evaluation results over one labelled dataset
#[derive(Debug, Clone)]
pub struct MulticlassMetrics {
    /// Fraction of all rows classified correctly
    pub micro_accuracy: f64,
    /// Mean per-class recall over classes present in the labels
    pub macro_accuracy: f64,
    /// Mean of `-ln p(true class)`
    pub log_loss: f64,
    /// `1 - log_loss / prior_log_loss`
    pub log_loss_reduction: f64,
    /// Log-loss of rows of each class; `None` for classes without rows
    pub per_class_log_loss: Vec<Option<f64>>,
    /// K used for `top_k_accuracy`
    pub top_k: usize,
    /// Fraction of rows whose true class is among the K highest scores
    pub top_k_accuracy: f64,
    pub confusion_matrix: ConfusionMatrix,
}

impl MulticlassMetrics {
    /// Compute metrics from true labels and the matching predictions
    pub fn compute(
        labels: &[usize],
        predictions: &[DigitPrediction],
        num_classes: usize,
        top_k: usize,
    ) -> Result<Self> {
        if labels.is_empty() {
            return Err(DigitError::EmptyDataset);
        }
        if labels.len() != predictions.len() {
            return Err(DigitError::DimensionMismatch {
                expected: labels.len(),
                actual: predictions.len(),
            });
        }
        if top_k == 0 {
            return Err(DigitError::InvalidParameter(
                "top_k must be at least 1".to_string(),
            ));
        }

        let n = labels.len();
        let mut confusion_matrix = ConfusionMatrix::new(num_classes);
        let mut class_loss = vec![0.0; num_classes];
        let mut total_loss = 0.0;
        let mut top_k_hits = 0;

        for (&label, prediction) in labels.iter().zip(predictions) {
            if label >= num_classes || prediction.num_classes() != num_classes {
                return Err(DigitError::DimensionMismatch {
                    expected: num_classes,
                    actual: prediction.num_classes().max(label + 1),
                });
            }

            confusion_matrix.record(label, prediction.label);

            let p_true = prediction.scores[label].clamp(PROBABILITY_EPSILON, 1.0);
            let loss = -p_true.ln();
            total_loss += loss;
            class_loss[label] += loss;

            let rank = prediction
                .scores
                .iter()
                .filter(|&&s| s > prediction.scores[label])
                .count();
            if rank < top_k {
                top_k_hits += 1;
            }
        }

        let class_counts = confusion_matrix.actual_counts();
        let micro_accuracy = confusion_matrix.correct() as f64 / n as f64;

        let recalls: Vec<f64> = (0..num_classes)
            .filter_map(|k| confusion_matrix.recall(k))
            .collect();
        let macro_accuracy = recalls.iter().sum::<f64>() / recalls.len() as f64;

        let log_loss = total_loss / n as f64;
        let prior_log_loss = prior_log_loss(&class_counts);
        let log_loss_reduction = if prior_log_loss > 0.0 {
            1.0 - log_loss / prior_log_loss
        } else {
            0.0
        };

        let per_class_log_loss = class_loss
            .iter()
            .zip(&class_counts)
            .map(|(&loss, &count)| (count > 0).then(|| loss / count as f64))
            .collect();

        Ok(Self {
            micro_accuracy,
            macro_accuracy,
            log_loss,
            log_loss_reduction,
            per_class_log_loss,
            top_k,
            top_k_accuracy: top_k_hits as f64 / n as f64,
            confusion_matrix,
        })
    }
}

/// Log-loss of always predicting the label frequencies
pub fn prior_log_loss(class_counts: &[usize]) -> f64 {
    let n: usize = class_counts.iter().sum();
    if n == 0 {
        return 0.0;
    }
    class_counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n as f64;
            -p * p.ln()
        })
        .sum()
}

/// Counts of (actual, predicted) class pairs
#[derive(Debug, Clone, PartialEq)]
pub struct ConfusionMatrix {
    counts: Vec<usize>,
    num_classes: usize,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![0; num_classes * num_classes],
            num_classes,
        }
    }

    pub fn record(&mut self, actual: usize, predicted: usize) {
        self.counts[actual * self.num_classes + predicted] += 1;
    }

    pub fn count(&self, actual: usize, predicted: usize) -> usize {
        self.counts[actual * self.num_classes + predicted]
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Number of correctly classified rows (the diagonal)
    pub fn correct(&self) -> usize {
        (0..self.num_classes).map(|k| self.count(k, k)).sum()
    }

    /// Rows per actual class
    pub fn actual_counts(&self) -> Vec<usize> {
        (0..self.num_classes)
            .map(|a| (0..self.num_classes).map(|p| self.count(a, p)).sum())
            .collect()
    }

    /// TP / (TP + FN) for class `k`; `None` if the class has no rows
    pub fn recall(&self, k: usize) -> Option<f64> {
        let actual: usize = (0..self.num_classes).map(|p| self.count(k, p)).sum();
        (actual > 0).then(|| self.count(k, k) as f64 / actual as f64)
    }

    /// TP / (TP + FP) for class `k`; `None` if the class was never predicted
    pub fn precision(&self, k: usize) -> Option<f64> {
        let predicted: usize = (0..self.num_classes).map(|a| self.count(a, k)).sum();
        (predicted > 0).then(|| self.count(k, k) as f64 / predicted as f64)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actual\\pred")?;
        for p in 0..self.num_classes {
            write!(f, "{p:>6}")?;
        }
        writeln!(f, "{:>9}", "recall")?;

        for a in 0..self.num_classes {
            write!(f, "{a:>11}")?;
            for p in 0..self.num_classes {
                write!(f, "{:>6}", self.count(a, p))?;
            }
            match self.recall(a) {
                Some(r) => writeln!(f, "{r:>9.4}")?,
                None => writeln!(f, "{:>9}", "-")?,
            }
        }
        Ok(())
    }
}
