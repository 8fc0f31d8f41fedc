//! Cache checkpoint for transformed training rows
//!
//! SDCA makes many passes over the same rows. Materializing the transformed
//! feature vectors once, together with their squared norms, turns each pass
//! into plain slice reads instead of re-running the feature transform.

use crate::core::{Dataset, FeatureSource, Result};
use crate::transform::FeatureTransform;
use log::debug;
use std::borrow::Cow;

/// Materialized feature rows in a single row-major buffer
#[derive(Debug, Clone)]
pub struct CacheCheckpoint {
    values: Vec<f64>,
    labels: Vec<usize>,
    norms_squared: Vec<f64>,
    dim: usize,
}

impl CacheCheckpoint {
    /// Run the transform over every digit and keep the results
    pub fn materialize<D: Dataset + ?Sized>(
        dataset: &D,
        transform: &FeatureTransform,
    ) -> Result<Self> {
        let n = dataset.len();
        let dim = transform.dim();
        let mut values = Vec::with_capacity(n * dim);
        let mut labels = Vec::with_capacity(n);
        let mut norms_squared = Vec::with_capacity(n);

        let mut row = Vec::with_capacity(dim);
        for i in 0..n {
            let digit = dataset.get_digit(i);
            transform.apply_into(&digit.pixels, &mut row)?;
            norms_squared.push(row.iter().map(|v| v * v).sum());
            values.extend_from_slice(&row);
            labels.push(digit.label);
        }

        let checkpoint = Self {
            values,
            labels,
            norms_squared,
            dim,
        };
        debug!(
            "Cache checkpoint holds {} rows ({} bytes)",
            n,
            checkpoint.stats().memory_bytes
        );
        Ok(checkpoint)
    }

    /// Borrow row `i` directly
    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i * self.dim..(i + 1) * self.dim]
    }

    /// Cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            rows: self.labels.len(),
            dim: self.dim,
            memory_bytes: self.values.len() * std::mem::size_of::<f64>()
                + self.norms_squared.len() * std::mem::size_of::<f64>()
                + self.labels.len() * std::mem::size_of::<usize>(),
        }
    }
}

impl FeatureSource for CacheCheckpoint {
    fn len(&self) -> usize {
        self.labels.len()
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn label(&self, i: usize) -> usize {
        self.labels[i]
    }

    fn features(&self, i: usize) -> Cow<'_, [f64]> {
        Cow::Borrowed(self.row(i))
    }

    fn norm_squared(&self, i: usize) -> f64 {
        self.norms_squared[i]
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub rows: usize,
    pub dim: usize,
    pub memory_bytes: usize,
}
