//! Error types for the digit classification pipeline

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DigitError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Optimization failed: {0}")]
    OptimizationError(String),

    #[error("Invalid label at line {line}: expected an integer in [0, {num_classes}), got {value}")]
    InvalidLabel {
        line: usize,
        value: f64,
        num_classes: usize,
    },

    #[error("Line {line} has {actual} columns, expected {expected}")]
    ColumnCount {
        line: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Empty dataset")]
    EmptyDataset,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

pub type Result<T> = std::result::Result<T, DigitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DigitError::ColumnCount {
            line: 3,
            expected: 785,
            actual: 784,
        };
        assert_eq!(err.to_string(), "Line 3 has 784 columns, expected 785");

        let err = DigitError::InvalidLabel {
            line: 1,
            value: 12.0,
            num_classes: 10,
        };
        assert!(err.to_string().contains("[0, 10)"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: DigitError = io.into();
        assert!(matches!(err, DigitError::IoError(_)));
    }
}
