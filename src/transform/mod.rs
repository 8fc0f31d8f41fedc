//! Feature transform applied before the trainer and the predictor
//!
//! The transform concatenates the schema's pixel columns into a single `f64`
//! feature vector and optionally rescales each column with parameters fitted
//! on the training rows. The same fitted transform is stored with the model
//! so prediction sees exactly what training saw.

use crate::core::{Dataset, DigitError, FeatureSource, Result};
use crate::utils::scaling::{ScalingMethod, ScalingParams};
use std::borrow::Cow;

/// Fitted concatenate-and-scale transform
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTransform {
    dim: usize,
    scaling: Option<ScalingParams>,
}

impl FeatureTransform {
    /// Plain concatenation with no scaling
    pub fn identity(dim: usize) -> Self {
        Self { dim, scaling: None }
    }

    /// Fit the transform on training digits
    pub fn fit<D: Dataset + ?Sized>(dataset: &D, scaling: Option<ScalingMethod>) -> Self {
        Self {
            dim: dataset.dim(),
            scaling: scaling.map(|method| ScalingParams::fit(dataset, method)),
        }
    }

    /// Rebuild from previously fitted scaling parameters
    pub fn from_parts(dim: usize, scaling: Option<ScalingParams>) -> Result<Self> {
        if let Some(params) = &scaling {
            if params.dim() != dim {
                return Err(DigitError::DimensionMismatch {
                    expected: dim,
                    actual: params.dim(),
                });
            }
        }
        Ok(Self { dim, scaling })
    }

    /// Input and output dimensionality
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn scaling(&self) -> Option<&ScalingParams> {
        self.scaling.as_ref()
    }

    /// Transform one pixel vector into `out`, reusing its allocation
    pub fn apply_into(&self, pixels: &[f32], out: &mut Vec<f64>) -> Result<()> {
        if pixels.len() != self.dim {
            return Err(DigitError::DimensionMismatch {
                expected: self.dim,
                actual: pixels.len(),
            });
        }
        match &self.scaling {
            Some(params) => params.transform_into(pixels, out),
            None => {
                out.clear();
                out.extend(pixels.iter().map(|&p| p as f64));
            }
        }
        Ok(())
    }

    /// Transform one pixel vector
    pub fn apply(&self, pixels: &[f32]) -> Result<Vec<f64>> {
        let mut out = Vec::with_capacity(self.dim);
        self.apply_into(pixels, &mut out)?;
        Ok(out)
    }

    /// Lazy view that transforms rows on every access
    pub fn view<'a, D: Dataset + ?Sized>(&'a self, dataset: &'a D) -> Result<FeatureView<'a, D>> {
        if dataset.dim() != self.dim {
            return Err(DigitError::DimensionMismatch {
                expected: self.dim,
                actual: dataset.dim(),
            });
        }
        Ok(FeatureView {
            transform: self,
            dataset,
        })
    }
}

/// Uncached feature source: each `features(i)` call re-runs the transform
pub struct FeatureView<'a, D: Dataset + ?Sized> {
    transform: &'a FeatureTransform,
    dataset: &'a D,
}

impl<D: Dataset + ?Sized> FeatureSource for FeatureView<'_, D> {
    fn len(&self) -> usize {
        self.dataset.len()
    }

    fn dim(&self) -> usize {
        self.transform.dim
    }

    fn label(&self, i: usize) -> usize {
        self.dataset.get_digit(i).label
    }

    fn features(&self, i: usize) -> Cow<'_, [f64]> {
        let pixels = &self.dataset.get_digit(i).pixels;
        let row = match &self.transform.scaling {
            Some(params) => params.transform(pixels),
            None => pixels.iter().map(|&p| p as f64).collect(),
        };
        Cow::Owned(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Digit, DigitSchema};
    use crate::data::DigitDataset;

    fn dataset() -> DigitDataset {
        DigitDataset::from_digits(
            vec![
                Digit::new(vec![0.0, 100.0], 0),
                Digit::new(vec![50.0, 200.0], 1),
            ],
            DigitSchema::new(2, 2),
        )
    }

    #[test]
    fn test_identity_transform() {
        let transform = FeatureTransform::identity(2);
        assert_eq!(transform.apply(&[3.0, 4.0]).unwrap(), vec![3.0, 4.0]);
        assert!(transform.scaling().is_none());
    }

    #[test]
    fn test_fitted_unit_scale() {
        let data = dataset();
        let transform = FeatureTransform::fit(&data, Some(ScalingMethod::UnitScale));
        assert_eq!(transform.apply(&[25.0, 200.0]).unwrap(), vec![0.5, 1.0]);
    }

    #[test]
    fn test_dimension_mismatch() {
        let transform = FeatureTransform::identity(2);
        assert!(matches!(
            transform.apply(&[1.0, 2.0, 3.0]),
            Err(DigitError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_view_matches_apply() {
        let data = dataset();
        let transform = FeatureTransform::fit(&data, Some(ScalingMethod::UnitScale));
        let view = transform.view(&data).unwrap();

        assert_eq!(view.len(), 2);
        assert_eq!(view.dim(), 2);
        assert_eq!(view.label(1), 1);
        assert_eq!(
            view.features(1).into_owned(),
            transform.apply(&data.get_digit(1).pixels).unwrap()
        );
        assert_eq!(view.norm_squared(1), 2.0);
    }

    #[test]
    fn test_from_parts_checks_dim() {
        let data = dataset();
        let fitted = FeatureTransform::fit(&data, Some(ScalingMethod::StandardScore));
        let params = fitted.scaling().cloned();
        assert!(FeatureTransform::from_parts(2, params.clone()).is_ok());
        assert!(FeatureTransform::from_parts(3, params).is_err());
    }
}
