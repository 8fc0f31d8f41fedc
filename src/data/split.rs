//! Randomized train/test partitioning

use crate::core::{Dataset, DigitError, Result};
use crate::data::DigitDataset;
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Fraction of rows held out for testing by default
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Disjoint train and test partitions of one dataset
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: DigitDataset,
    pub test: DigitDataset,
}

/// Shuffle the rows and hold out `round(n * test_fraction)` of them for testing
///
/// A `seed` makes the split reproducible; without one the order is drawn
/// from OS entropy and differs per run. The split is not stratified.
pub fn train_test_split(
    dataset: &DigitDataset,
    test_fraction: f64,
    seed: Option<u64>,
) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(DigitError::InvalidParameter(format!(
            "test fraction must be between 0 and 1, got: {test_fraction}"
        )));
    }
    if dataset.is_empty() {
        return Err(DigitError::EmptyDataset);
    }
    let test_len = ((dataset.len() as f64) * test_fraction).round() as usize;
    if test_len == 0 || test_len >= dataset.len() {
        return Err(DigitError::InvalidParameter(format!(
            "test fraction {test_fraction} of {} rows leaves an empty train or test set",
            dataset.len()
        )));
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut order: Vec<usize> = (0..dataset.len()).collect();
    order.shuffle(&mut rng);

    let split_index = dataset.len() - test_len;
    let (train_idx, test_idx) = order.split_at(split_index);

    debug!(
        "Split {} rows into {} train / {} test",
        dataset.len(),
        train_idx.len(),
        test_idx.len()
    );

    Ok(TrainTestSplit {
        train: dataset.subset(train_idx),
        test: dataset.subset(test_idx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Digit, DigitSchema};
    use std::collections::HashSet;

    fn dataset(n: usize) -> DigitDataset {
        let digits = (0..n)
            .map(|i| Digit::new(vec![i as f32, 0.0], i % 10))
            .collect();
        DigitDataset::from_digits(digits, DigitSchema::new(2, 10))
    }

    #[test]
    fn test_split_sizes() {
        let data = dataset(100);
        let split = train_test_split(&data, 0.2, Some(7)).unwrap();
        assert_eq!(split.train.len(), 80);
        assert_eq!(split.test.len(), 20);
    }

    #[test]
    fn test_split_is_disjoint_and_complete() {
        let data = dataset(57);
        let split = train_test_split(&data, 0.2, Some(1)).unwrap();

        assert_eq!(split.train.len() + split.test.len(), 57);

        let train: HashSet<usize> = (0..split.train.len())
            .map(|i| split.train.source_index(i))
            .collect();
        let test: HashSet<usize> = (0..split.test.len())
            .map(|i| split.test.source_index(i))
            .collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 57);

        let fraction = split.test.len() as f64 / 57.0;
        assert!((fraction - 0.2).abs() < 0.02);
    }

    #[test]
    fn test_split_rows_follow_source_index() {
        let data = dataset(30);
        let split = train_test_split(&data, 0.3, Some(3)).unwrap();
        for i in 0..split.test.len() {
            let source = split.test.source_index(i);
            assert_eq!(split.test.get_digit(i), data.get_digit(source));
        }
    }

    #[test]
    fn test_split_seed_is_reproducible() {
        let data = dataset(40);
        let a = train_test_split(&data, 0.25, Some(99)).unwrap();
        let b = train_test_split(&data, 0.25, Some(99)).unwrap();
        assert_eq!(a.test.get_labels(), b.test.get_labels());
        assert_eq!(a.train.get_labels(), b.train.get_labels());
    }

    #[test]
    fn test_split_invalid_fraction() {
        let data = dataset(10);
        for fraction in [0.0, 1.0, -0.5, 1.5, f64::NAN] {
            assert!(train_test_split(&data, fraction, None).is_err());
        }
    }

    #[test]
    fn test_split_rejects_empty_side() {
        for n in [1, 2] {
            let data = dataset(n);
            assert!(
                matches!(
                    train_test_split(&data, 0.2, Some(5)),
                    Err(DigitError::InvalidParameter(_))
                ),
                "{n} rows should not split"
            );
        }
        assert!(matches!(
            train_test_split(&dataset(2), 0.9, Some(5)),
            Err(DigitError::InvalidParameter(_))
        ));

        let split = train_test_split(&dataset(3), 0.2, Some(5)).unwrap();
        assert_eq!(split.train.len(), 2);
        assert_eq!(split.test.len(), 1);
    }
}
