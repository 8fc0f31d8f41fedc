//! End-to-end digit pipeline: load → split → train → evaluate → predict
//!
//! All inputs come from an explicit [`PipelineConfig`]; nothing is read from
//! process-wide state.

use crate::api::{SdcaMaximumEntropy, TrainedModel};
use crate::core::{Dataset, DigitError, DigitPrediction, DigitSchema, Result, TrainerConfig};
use crate::data::{train_test_split, DigitDataset, DEFAULT_TEST_FRACTION};
use crate::metrics::{MulticlassMetrics, DEFAULT_TOP_K};
use crate::utils::validation;
use log::info;
use std::path::PathBuf;

/// Default input file, relative to the working directory
pub const DEFAULT_DATA_PATH: &str = "handwritten_digits_large.csv";

/// Rows predicted after evaluation by default
pub const DEFAULT_SAMPLE_ROWS: [usize; 3] = [5, 12, 20];

/// Everything the pipeline needs to run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub data_path: PathBuf,
    pub schema: DigitSchema,
    pub test_fraction: f64,
    /// Seed for the train/test split; `None` varies per run
    pub split_seed: Option<u64>,
    pub trainer: TrainerConfig,
    /// Row indices into the loaded dataset to predict and report
    pub sample_rows: Vec<usize>,
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_PATH),
            schema: DigitSchema::default(),
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: None,
            trainer: TrainerConfig::default(),
            sample_rows: DEFAULT_SAMPLE_ROWS.to_vec(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Pipeline stage, reported before it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Training,
    Evaluating,
    Predicting,
}

/// Prediction for one selected row of the loaded dataset
#[derive(Debug, Clone)]
pub struct SamplePrediction {
    pub row: usize,
    pub label: usize,
    pub prediction: DigitPrediction,
}

/// Outcome of a pipeline run
#[derive(Debug)]
pub struct PipelineReport {
    pub total_rows: usize,
    pub train_rows: usize,
    pub test_rows: usize,
    pub metrics: MulticlassMetrics,
    pub samples: Vec<SamplePrediction>,
    pub model: TrainedModel,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage
    pub fn run(&self) -> Result<PipelineReport> {
        self.run_with_observer(|_| {})
    }

    /// Run every stage, calling `observer` as each one starts
    pub fn run_with_observer<F: FnMut(Stage)>(&self, mut observer: F) -> Result<PipelineReport> {
        observer(Stage::Loading);
        info!("Loading digits from {:?}", self.config.data_path);
        let dataset =
            DigitDataset::from_file_with_schema(&self.config.data_path, self.config.schema)?;
        self.check_sample_rows(&dataset)?;
        info!(
            "Loaded {} digits, class distribution {:?}",
            dataset.len(),
            validation::class_distribution(&dataset)
        );

        let split = train_test_split(&dataset, self.config.test_fraction, self.config.split_seed)?;
        info!(
            "Split into {} train / {} test digits",
            split.train.len(),
            split.test.len()
        );

        observer(Stage::Training);
        let model = SdcaMaximumEntropy::with_config(self.config.trainer.clone()).train(&split.train)?;

        observer(Stage::Evaluating);
        let metrics = model.evaluate_with_top_k(&split.test, self.config.top_k)?;
        info!(
            "Test micro-accuracy {:.4}, log-loss {:.4}",
            metrics.micro_accuracy, metrics.log_loss
        );

        observer(Stage::Predicting);
        let mut engine = model.prediction_engine();
        let samples = self
            .config
            .sample_rows
            .iter()
            .map(|&row| {
                let digit = dataset.get_digit(row);
                Ok(SamplePrediction {
                    row,
                    label: digit.label,
                    prediction: engine.predict(digit)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(PipelineReport {
            total_rows: dataset.len(),
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            metrics,
            samples,
            model,
        })
    }

    fn check_sample_rows(&self, dataset: &DigitDataset) -> Result<()> {
        match self.config.sample_rows.iter().find(|&&row| row >= dataset.len()) {
            Some(row) => Err(DigitError::InvalidParameter(format!(
                "sample row {row} is out of range for {} loaded digits",
                dataset.len()
            ))),
            None => Ok(()),
        }
    }
}
