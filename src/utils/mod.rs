//! Utility functions for feature preprocessing and dataset checks

use crate::core::Dataset;

/// Feature scaling utilities
pub mod scaling {
    use super::*;
    use serde::{Deserialize, Serialize};

    /// Per-column rescaling applied to pixel values
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub enum ScalingMethod {
        /// Map the observed column range onto `[min_val, max_val]`
        MinMax { min_val: f64, max_val: f64 },
        /// Subtract the column mean, divide by the sample deviation
        StandardScore,
        /// Divide by the largest absolute value, so 0..255 becomes 0..1
        UnitScale,
    }

    impl Default for ScalingMethod {
        fn default() -> Self {
            Self::MinMax {
                min_val: 0.0,
                max_val: 1.0,
            }
        }
    }

    /// Statistics for a single feature column
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct FeatureStats {
        pub min: f64,
        pub max: f64,
        pub mean: f64,
        pub std: f64,
    }

    /// Fitted scaling parameters, one entry per feature column
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ScalingParams {
        pub method: ScalingMethod,
        pub feature_stats: Vec<FeatureStats>,
    }

    impl ScalingParams {
        /// Compute per-column statistics from the digits of a dataset
        pub fn fit<D: Dataset + ?Sized>(dataset: &D, method: ScalingMethod) -> Self {
            let dim = dataset.dim();
            let n = dataset.len();

            let mut min = vec![f64::INFINITY; dim];
            let mut max = vec![f64::NEG_INFINITY; dim];
            let mut sum = vec![0.0; dim];

            for i in 0..n {
                for (j, &pixel) in dataset.get_digit(i).pixels.iter().enumerate() {
                    let value = pixel as f64;
                    min[j] = min[j].min(value);
                    max[j] = max[j].max(value);
                    sum[j] += value;
                }
            }

            let mean: Vec<f64> = sum.iter().map(|s| s / n.max(1) as f64).collect();

            // Sample variance, second pass
            let mut sq_dev = vec![0.0; dim];
            for i in 0..n {
                for (j, &pixel) in dataset.get_digit(i).pixels.iter().enumerate() {
                    sq_dev[j] += (pixel as f64 - mean[j]).powi(2);
                }
            }

            let feature_stats = (0..dim)
                .map(|j| {
                    let variance = if n > 1 {
                        sq_dev[j] / (n - 1) as f64
                    } else {
                        0.0
                    };
                    FeatureStats {
                        min: if n == 0 { 0.0 } else { min[j] },
                        max: if n == 0 { 0.0 } else { max[j] },
                        mean: mean[j],
                        std: variance.sqrt(),
                    }
                })
                .collect();

            Self {
                method,
                feature_stats,
            }
        }

        /// Number of columns the parameters were fitted on
        pub fn dim(&self) -> usize {
            self.feature_stats.len()
        }

        /// Scale one pixel vector into `out`
        ///
        /// `pixels` must have `dim()` entries.
        pub fn transform_into(&self, pixels: &[f32], out: &mut Vec<f64>) {
            out.clear();
            out.extend(
                pixels
                    .iter()
                    .zip(self.feature_stats.iter())
                    .map(|(&value, stats)| self.scale_value(value as f64, stats)),
            );
        }

        /// Scale one pixel vector
        pub fn transform(&self, pixels: &[f32]) -> Vec<f64> {
            let mut out = Vec::with_capacity(pixels.len());
            self.transform_into(pixels, &mut out);
            out
        }

        /// Center and spread of a column under this method
        fn column_range(&self, stats: &FeatureStats) -> (f64, f64) {
            match self.method {
                ScalingMethod::MinMax { .. } => (stats.min, stats.max - stats.min),
                ScalingMethod::StandardScore => (stats.mean, stats.std),
                ScalingMethod::UnitScale => (0.0, stats.max.abs().max(stats.min.abs())),
            }
        }

        fn scale_value(&self, value: f64, stats: &FeatureStats) -> f64 {
            let (center, spread) = self.column_range(stats);
            // Constant columns have no spread to divide by
            let unit = (spread >= 1e-12).then(|| (value - center) / spread);
            match (self.method, unit) {
                (ScalingMethod::MinMax { min_val, max_val }, Some(u)) => {
                    min_val + u * (max_val - min_val)
                }
                (ScalingMethod::MinMax { min_val, max_val }, None) => 0.5 * (min_val + max_val),
                (_, Some(u)) => u,
                (_, None) => 0.0,
            }
        }
    }
}

/// Dataset sanity checks
pub mod validation {
    use super::*;

    /// Number of rows per class
    pub fn class_distribution<D: Dataset + ?Sized>(dataset: &D) -> Vec<usize> {
        let mut counts = vec![0; dataset.num_classes()];
        for label in dataset.get_labels() {
            if label < counts.len() {
                counts[label] += 1;
            }
        }
        counts
    }

    /// Number of classes with at least one row
    pub fn classes_present<D: Dataset + ?Sized>(dataset: &D) -> usize {
        class_distribution(dataset)
            .iter()
            .filter(|&&c| c > 0)
            .count()
    }

    /// Check that every label is below the class count
    pub fn validate_labels<D: Dataset + ?Sized>(dataset: &D) -> Result<(), String> {
        let num_classes = dataset.num_classes();
        for (i, label) in dataset.get_labels().into_iter().enumerate() {
            if label >= num_classes {
                return Err(format!(
                    "Invalid label {label} at index {i}: labels must be below {num_classes}"
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::scaling::*;
    use super::validation::*;
    use crate::core::{Digit, DigitSchema};
    use crate::data::DigitDataset;
    use approx::assert_relative_eq;

    fn dataset() -> DigitDataset {
        let digits = vec![
            Digit::new(vec![0.0, 10.0, 5.0], 0),
            Digit::new(vec![255.0, 20.0, 5.0], 1),
            Digit::new(vec![51.0, 30.0, 5.0], 1),
        ];
        DigitDataset::from_digits(digits, DigitSchema::new(3, 4))
    }

    #[test]
    fn test_fit_statistics() {
        let params = ScalingParams::fit(&dataset(), ScalingMethod::UnitScale);
        assert_eq!(params.dim(), 3);

        let stats = params.feature_stats[1];
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 30.0);
        assert_relative_eq!(stats.mean, 20.0);
        assert_relative_eq!(stats.std, 10.0);
    }

    #[test]
    fn test_unit_scale() {
        let params = ScalingParams::fit(&dataset(), ScalingMethod::UnitScale);
        let scaled = params.transform(&[255.0, 15.0, 5.0]);
        assert_relative_eq!(scaled[0], 1.0);
        assert_relative_eq!(scaled[1], 0.5);
        assert_relative_eq!(scaled[2], 1.0);
    }

    #[test]
    fn test_min_max_scale() {
        let method = ScalingMethod::MinMax {
            min_val: -1.0,
            max_val: 1.0,
        };
        let params = ScalingParams::fit(&dataset(), method);
        let scaled = params.transform(&[0.0, 20.0, 5.0]);
        assert_relative_eq!(scaled[0], -1.0);
        assert_relative_eq!(scaled[1], 0.0);
        // Constant column maps to the midpoint
        assert_relative_eq!(scaled[2], 0.0);
    }

    #[test]
    fn test_standard_score() {
        let params = ScalingParams::fit(&dataset(), ScalingMethod::StandardScore);
        let scaled = params.transform(&[0.0, 30.0, 5.0]);
        assert_relative_eq!(scaled[1], 1.0);
        assert_eq!(scaled[2], 0.0);
    }

    #[test]
    fn test_class_distribution() {
        let data = dataset();
        assert_eq!(class_distribution(&data), vec![1, 2, 0, 0]);
        assert_eq!(classes_present(&data), 2);
        assert!(validate_labels(&data).is_ok());
    }

    #[test]
    fn test_validate_labels_invalid() {
        let data = DigitDataset::from_digits(
            vec![Digit::new(vec![0.0], 5)],
            DigitSchema::new(1, 3),
        );
        assert!(validate_labels(&data).is_err());
        assert_eq!(class_distribution(&data), vec![0, 0, 0]);
    }
}
