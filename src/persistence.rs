//! JSON model files
//!
//! Trained models are stored as pretty-printed JSON so the CLI can train
//! once and evaluate or predict later.

use crate::api::TrainedModel;
use crate::core::{DigitError, DigitSchema, Result, TrainerConfig};
use crate::optimizer::LinearClassifier;
use crate::transform::FeatureTransform;
use crate::utils::scaling::ScalingParams;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Serializable representation of a trained model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableModel {
    /// Class-major weights, `num_classes * dim` values
    pub weights: Vec<f64>,
    /// Bias per class
    pub bias: Vec<f64>,
    /// Schema the model was trained against
    pub schema: DigitSchema,
    /// Fitted feature scaling, if any
    pub scaling: Option<ScalingParams>,
    /// Model metadata
    pub metadata: ModelMetadata,
}

/// Provenance stored alongside the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Library version used to create the model
    pub library_version: String,
    /// Trainer settings
    pub training_params: TrainingParams,
    /// Epochs the solver ran
    pub epochs: usize,
    /// Final duality gap; absent for models that were not trained here
    pub duality_gap: Option<f64>,
    /// Creation timestamp
    pub created_at: String,
}

/// Trainer settings the model was fitted with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingParams {
    pub l2: f64,
    pub tolerance: f64,
    pub max_epochs: usize,
    pub seed: Option<u64>,
}

impl From<&TrainerConfig> for TrainingParams {
    fn from(config: &TrainerConfig) -> Self {
        Self {
            l2: config.l2,
            tolerance: config.tolerance,
            max_epochs: config.max_epochs,
            seed: config.seed,
        }
    }
}

impl SerializableModel {
    /// Snapshot a trained model with the settings that produced it
    pub fn from_trained_model(model: &TrainedModel, config: &TrainerConfig) -> Self {
        let classifier = model.classifier();
        Self {
            weights: classifier.weights().to_vec(),
            bias: classifier.bias().to_vec(),
            schema: *model.schema(),
            scaling: model.transform().scaling().cloned(),
            metadata: ModelMetadata {
                library_version: env!("CARGO_PKG_VERSION").to_string(),
                training_params: TrainingParams::from(config),
                epochs: classifier.epochs(),
                duality_gap: classifier.duality_gap(),
                created_at: chrono::Utc::now().to_rfc3339(),
            },
        }
    }

    /// Save model to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).map_err(DigitError::IoError)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| DigitError::SerializationError(e.to_string()))?;
        Ok(())
    }

    /// Load model from file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path).map_err(DigitError::IoError)?;
        let reader = BufReader::new(file);
        let model = serde_json::from_reader(reader)
            .map_err(|e| DigitError::SerializationError(e.to_string()))?;
        Ok(model)
    }

    /// Rebuild a working model, validating every shape
    pub fn to_trained_model(&self) -> Result<TrainedModel> {
        let dim = self.schema.feature_count;
        let transform = FeatureTransform::from_parts(dim, self.scaling.clone())?;
        let mut classifier = LinearClassifier::from_parts(
            self.weights.clone(),
            self.bias.clone(),
            dim,
            self.schema.num_classes,
        )?;
        classifier.set_training_info(self.metadata.epochs, self.metadata.duality_gap);
        TrainedModel::from_parts(transform, classifier, self.schema)
    }

    /// Print model summary
    pub fn print_summary(&self) {
        println!("=== Digit Classifier Summary ===");
        println!("Classes: {}", self.schema.num_classes);
        println!("Features: {}", self.schema.feature_count);
        match &self.scaling {
            Some(params) => println!("Scaling: {:?}", params.method),
            None => println!("Scaling: none"),
        }
        println!("Epochs: {}", self.metadata.epochs);
        match self.metadata.duality_gap {
            Some(gap) => println!("Duality gap: {gap:.6e}"),
            None => println!("Duality gap: n/a"),
        }
        println!("Library Version: {}", self.metadata.library_version);
        println!("Created: {}", self.metadata.created_at);
        println!("Training Parameters:");
        println!("  L2: {}", self.metadata.training_params.l2);
        println!("  Tolerance: {}", self.metadata.training_params.tolerance);
        println!(
            "  Max Epochs: {}",
            self.metadata.training_params.max_epochs
        );
        if let Some(seed) = self.metadata.training_params.seed {
            println!("  Seed: {seed}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SdcaMaximumEntropy;
    use crate::core::{Dataset, Digit};
    use crate::data::DigitDataset;
    use tempfile::NamedTempFile;

    fn trained() -> (TrainedModel, TrainerConfig, DigitDataset) {
        let digits = vec![
            Digit::new(vec![9.0, 0.0, 1.0], 0),
            Digit::new(vec![0.0, 9.0, 1.0], 1),
            Digit::new(vec![8.0, 1.0, 1.0], 0),
            Digit::new(vec![1.0, 8.0, 1.0], 1),
        ];
        let data = DigitDataset::from_digits(digits, DigitSchema::new(3, 2));
        let trainer = SdcaMaximumEntropy::new().with_l2(1e-2).with_seed(2);
        let model = trainer.train(&data).expect("Training should succeed");
        (model, trainer.config().clone(), data)
    }

    #[test]
    fn test_model_serialization_round_trip() -> Result<()> {
        let (model, config, data) = trained();
        let serializable = SerializableModel::from_trained_model(&model, &config);

        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        serializable.save_to_file(temp_file.path())?;

        let loaded = SerializableModel::load_from_file(temp_file.path())?;
        assert_eq!(loaded.schema, serializable.schema);
        assert_eq!(loaded.metadata.training_params.l2, 1e-2);
        assert_eq!(loaded.metadata.training_params.seed, Some(2));

        let restored = loaded.to_trained_model()?;
        for i in 0..data.len() {
            let a = model.predict(data.get_digit(i))?;
            let b = restored.predict(data.get_digit(i))?;
            assert_eq!(a.label, b.label);
            for (x, y) in a.scores.iter().zip(&b.scores) {
                assert!((x - y).abs() < 1e-12);
            }
        }
        assert_eq!(restored.info().epochs, model.info().epochs);

        Ok(())
    }

    #[test]
    fn test_model_from_parts_round_trip() -> Result<()> {
        let schema = DigitSchema::new(3, 2);
        let classifier = LinearClassifier::from_parts(vec![0.0; 6], vec![0.0; 2], 3, 2)?;
        let model = TrainedModel::from_parts(FeatureTransform::identity(3), classifier, schema)?;
        let serializable = SerializableModel::from_trained_model(&model, &TrainerConfig::default());
        assert_eq!(serializable.metadata.duality_gap, None);

        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        serializable.save_to_file(temp_file.path())?;
        let loaded = SerializableModel::load_from_file(temp_file.path())?;
        assert_eq!(loaded.metadata.duality_gap, None);

        let restored = loaded.to_trained_model()?;
        assert_eq!(restored.info().duality_gap, None);
        let digit = Digit::new(vec![1.0, 2.0, 3.0], 0);
        assert_eq!(restored.predict(&digit)?, model.predict(&digit)?);

        Ok(())
    }

    #[test]
    fn test_corrupt_shapes_rejected() {
        let (model, config, _) = trained();
        let mut serializable = SerializableModel::from_trained_model(&model, &config);
        serializable.weights.pop();
        assert!(matches!(
            serializable.to_trained_model(),
            Err(DigitError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_load_invalid_json() {
        let temp_file = NamedTempFile::new().expect("Failed to create temp file");
        std::fs::write(temp_file.path(), "{ not json").expect("Failed to write");
        assert!(matches!(
            SerializableModel::load_from_file(temp_file.path()),
            Err(DigitError::SerializationError(_))
        ));
    }
}
