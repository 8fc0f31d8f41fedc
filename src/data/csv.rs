//! CSV digit dataset loader
//!
//! Reads headerless, comma-separated files where every row has exactly
//! `schema.columns()` numeric fields. With the default schema column 0 is
//! the label and columns 1..=784 are the pixel intensities.
//!
//! Rows are validated strictly: a wrong column count, a non-numeric field or
//! an out-of-range label aborts loading instead of being truncated or padded.

use crate::core::{Dataset, Digit, DigitError, DigitSchema, Result};
use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// In-memory digit dataset
#[derive(Debug, Clone)]
pub struct DigitDataset {
    digits: Vec<Digit>,
    schema: DigitSchema,
    /// Position of each digit in the file it was loaded from
    source_indices: Vec<usize>,
}

impl DigitDataset {
    /// Load a dataset from a CSV file using the default 784-pixel schema
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_file_with_schema(path, DigitSchema::default())
    }

    /// Load a dataset from a CSV file with an explicit schema
    pub fn from_file_with_schema<P: AsRef<Path>>(path: P, schema: DigitSchema) -> Result<Self> {
        let path = path.as_ref();
        debug!("Opening digit file {path:?}");
        let file = File::open(path).map_err(DigitError::IoError)?;
        Self::from_reader(BufReader::new(file), schema)
    }

    /// Load a dataset from any buffered reader
    pub fn from_reader<R: BufRead>(reader: R, schema: DigitSchema) -> Result<Self> {
        schema.validate()?;

        let mut digits = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(DigitError::IoError)?;
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            digits.push(Self::parse_row(line, line_num + 1, &schema)?);
        }

        if digits.is_empty() {
            return Err(DigitError::EmptyDataset);
        }

        debug!(
            "Parsed {} digits with {} features each",
            digits.len(),
            schema.feature_count
        );

        Ok(Self::from_digits(digits, schema))
    }

    /// Build a dataset from already-constructed digits
    ///
    /// The caller is responsible for the digits matching the schema; use
    /// [`DigitDataset::try_from_digits`] when they come from outside.
    pub fn from_digits(digits: Vec<Digit>, schema: DigitSchema) -> Self {
        let source_indices = (0..digits.len()).collect();
        Self {
            digits,
            schema,
            source_indices,
        }
    }

    /// Build a dataset from digits, checking widths and labels against the schema
    pub fn try_from_digits(digits: Vec<Digit>, schema: DigitSchema) -> Result<Self> {
        schema.validate()?;
        for (i, digit) in digits.iter().enumerate() {
            if digit.dim() != schema.feature_count {
                return Err(DigitError::DimensionMismatch {
                    expected: schema.feature_count,
                    actual: digit.dim(),
                });
            }
            if digit.label >= schema.num_classes {
                return Err(DigitError::InvalidLabel {
                    line: i + 1,
                    value: digit.label as f64,
                    num_classes: schema.num_classes,
                });
            }
        }
        Ok(Self::from_digits(digits, schema))
    }

    /// Parse a single CSV row
    fn parse_row(line: &str, line_num: usize, schema: &DigitSchema) -> Result<Digit> {
        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();

        if fields.len() != schema.columns() {
            return Err(DigitError::ColumnCount {
                line: line_num,
                expected: schema.columns(),
                actual: fields.len(),
            });
        }

        let label_str = fields[schema.label_column];
        let label_value = label_str.parse::<f64>().map_err(|_| {
            DigitError::ParseError(format!(
                "Invalid label at line {line_num}, column {}: {label_str}",
                schema.label_column + 1
            ))
        })?;
        if label_value.fract() != 0.0
            || label_value < 0.0
            || label_value >= schema.num_classes as f64
        {
            return Err(DigitError::InvalidLabel {
                line: line_num,
                value: label_value,
                num_classes: schema.num_classes,
            });
        }

        let mut pixels = Vec::with_capacity(schema.feature_count);
        let feature_fields = &fields[schema.feature_start..schema.feature_start + schema.feature_count];
        for (offset, field) in feature_fields.iter().enumerate() {
            let value = field
                .parse::<f32>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| {
                    DigitError::ParseError(format!(
                        "Invalid pixel value at line {line_num}, column {}: {field}",
                        schema.feature_start + offset + 1
                    ))
                })?;
            pixels.push(value);
        }

        Ok(Digit::new(pixels, label_value as usize))
    }

    /// Schema the dataset was loaded with
    pub fn schema(&self) -> &DigitSchema {
        &self.schema
    }

    /// All digits in order
    pub fn digits(&self) -> &[Digit] {
        &self.digits
    }

    /// Original file position of digit `i`
    pub fn source_index(&self, i: usize) -> usize {
        self.source_indices[i]
    }

    /// Copy out the digits at `indices`, keeping their source positions
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            digits: indices.iter().map(|&i| self.digits[i].clone()).collect(),
            schema: self.schema,
            source_indices: indices.iter().map(|&i| self.source_indices[i]).collect(),
        }
    }
}

impl Dataset for DigitDataset {
    fn len(&self) -> usize {
        self.digits.len()
    }

    fn dim(&self) -> usize {
        self.schema.feature_count
    }

    fn num_classes(&self) -> usize {
        self.schema.num_classes
    }

    fn get_digit(&self, i: usize) -> &Digit {
        &self.digits[i]
    }
}
