//! rdigits command line interface
//!
//! Trains, evaluates and applies SDCA maximum-entropy digit classifiers on
//! headerless, label-first CSV files.

use clap::{Args, Parser, Subcommand, ValueEnum};
use env_logger::Env;
use log::{error, info};
use rdigits::api::SdcaMaximumEntropy;
use rdigits::core::{Dataset, DigitError, DigitPrediction, Result, TrainerConfig};
use rdigits::data::DigitDataset;
use rdigits::metrics::{MulticlassMetrics, DEFAULT_TOP_K};
use rdigits::persistence::SerializableModel;
use rdigits::pipeline::{Pipeline, PipelineConfig, Stage, DEFAULT_DATA_PATH, DEFAULT_SAMPLE_ROWS};
use rdigits::utils::scaling::ScalingMethod;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "rdigits")]
#[command(about = "Handwritten digit classification with an SDCA maximum-entropy trainer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "rdigits contributors")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Load, split, train, evaluate and predict sample digits
    Run(RunArgs),
    /// Train a model on a CSV file and save it
    Train(TrainArgs),
    /// Evaluate a saved model on a CSV file
    Evaluate(EvaluateArgs),
    /// Print class scores for selected rows of a CSV file
    Predict(PredictArgs),
    /// Display model information
    Info(InfoArgs),
}

#[derive(Args, Clone)]
struct TrainerArgs {
    /// L2 regularization strength
    #[arg(long, default_value = "0.0001")]
    l2: f64,

    /// Relative duality gap at which training stops
    #[arg(long, default_value = "0.01")]
    tolerance: f64,

    /// Maximum passes over the training data
    #[arg(long, default_value = "30")]
    max_epochs: usize,

    /// Seed for the SDCA visiting order
    #[arg(long)]
    seed: Option<u64>,

    /// Recompute features every epoch instead of caching them
    #[arg(long)]
    no_cache: bool,

    /// Visit rows in file order every epoch
    #[arg(long)]
    no_shuffle: bool,

    /// Feature scaling method
    #[arg(long, default_value = "unit")]
    scaling: CliScalingMethod,
}

#[derive(ValueEnum, Clone, Debug)]
enum CliScalingMethod {
    /// Raw pixel values
    #[value(name = "none")]
    None,
    /// Min-Max scaling to [0, 1] range
    #[value(name = "minmax")]
    MinMax,
    /// Standard score (Z-score) normalization
    #[value(name = "standard")]
    StandardScore,
    /// Unit scaling by maximum absolute value
    #[value(name = "unit")]
    UnitScale,
}

impl From<CliScalingMethod> for Option<ScalingMethod> {
    fn from(cli_method: CliScalingMethod) -> Self {
        match cli_method {
            CliScalingMethod::None => None,
            CliScalingMethod::MinMax => Some(ScalingMethod::MinMax {
                min_val: 0.0,
                max_val: 1.0,
            }),
            CliScalingMethod::StandardScore => Some(ScalingMethod::StandardScore),
            CliScalingMethod::UnitScale => Some(ScalingMethod::UnitScale),
        }
    }
}

impl From<&TrainerArgs> for TrainerConfig {
    fn from(args: &TrainerArgs) -> Self {
        TrainerConfig {
            l2: args.l2,
            tolerance: args.tolerance,
            max_epochs: args.max_epochs,
            shuffle: !args.no_shuffle,
            seed: args.seed,
            cache: !args.no_cache,
            scaling: args.scaling.clone().into(),
        }
    }
}

#[derive(Args)]
struct RunArgs {
    /// Digit CSV file (label first, no header)
    #[arg(long, default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,

    /// Fraction of rows held out for evaluation
    #[arg(long, default_value = "0.2")]
    test_fraction: f64,

    /// Seed for the train/test split
    #[arg(long)]
    split_seed: Option<u64>,

    /// Row indices of the loaded data to predict
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_SAMPLE_ROWS)]
    samples: Vec<usize>,

    /// K for top-K accuracy
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Save the trained model to this file
    #[arg(long)]
    save_model: Option<PathBuf>,

    #[command(flatten)]
    trainer: TrainerArgs,
}

#[derive(Args)]
struct TrainArgs {
    /// Training data file
    #[arg(long)]
    data: PathBuf,

    /// Output model file
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    trainer: TrainerArgs,
}

#[derive(Args)]
struct EvaluateArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Test data file
    #[arg(long)]
    data: PathBuf,

    /// K for top-K accuracy
    #[arg(long, default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    /// Show per-class log-loss and the confusion matrix
    #[arg(long)]
    detailed: bool,
}

#[derive(Args)]
struct PredictArgs {
    /// Trained model file
    #[arg(short, long)]
    model: PathBuf,

    /// Input data file
    #[arg(long)]
    data: PathBuf,

    /// Row indices to predict
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_SAMPLE_ROWS)]
    rows: Vec<usize>,
}

#[derive(Args)]
struct InfoArgs {
    /// Model file
    model: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Run(args) => run_command(args),
        Commands::Train(args) => train_command(args),
        Commands::Evaluate(args) => evaluate_command(args),
        Commands::Predict(args) => predict_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(args: RunArgs) -> Result<()> {
    let trainer = TrainerConfig::from(&args.trainer);
    let config = PipelineConfig {
        data_path: args.data,
        test_fraction: args.test_fraction,
        split_seed: args.split_seed,
        trainer: trainer.clone(),
        sample_rows: args.samples,
        top_k: args.top_k,
        ..PipelineConfig::default()
    };

    let report = Pipeline::new(config).run_with_observer(|stage| match stage {
        Stage::Loading => println!("Loading data..."),
        Stage::Training => println!("Training model..."),
        Stage::Evaluating => println!("Evaluating model..."),
        Stage::Predicting => {}
    })?;

    info!(
        "{} digits: {} train / {} test",
        report.total_rows, report.train_rows, report.test_rows
    );

    print_metrics(&report.metrics);
    println!();

    for (i, sample) in report.samples.iter().enumerate() {
        println!(
            "Predicting test digit {i} (row {}, actual {})...",
            sample.row, sample.label
        );
        print_scores(&sample.prediction);
        println!();
    }

    if let Some(path) = args.save_model {
        SerializableModel::from_trained_model(&report.model, &trainer).save_to_file(&path)?;
        info!("Model saved to: {path:?}");
    }

    Ok(())
}

fn train_command(args: TrainArgs) -> Result<()> {
    info!("Training digit classifier...");
    info!("Data file: {:?}", args.data);

    let config = TrainerConfig::from(&args.trainer);
    info!(
        "Parameters: l2={}, tolerance={}, max_epochs={}",
        config.l2, config.tolerance, config.max_epochs
    );

    let dataset = DigitDataset::from_file(&args.data)?;
    info!(
        "Loaded {} digits with {} features",
        dataset.len(),
        dataset.dim()
    );

    if dataset.len() < 2 {
        return Err(DigitError::InvalidParameter(
            "Dataset must contain at least 2 digits".to_string(),
        ));
    }

    let model = SdcaMaximumEntropy::with_config(config.clone()).train(&dataset)?;

    let model_info = model.info();
    if let Some(gap) = model_info.duality_gap {
        info!(
            "Training completed after {} epochs (duality gap {gap:.3e})",
            model_info.epochs
        );
    }

    SerializableModel::from_trained_model(&model, &config).save_to_file(&args.output)?;
    info!("Model saved to: {:?}", args.output);

    let metrics = model.evaluate(&dataset)?;
    println!("Training accuracy: {:.2}%", metrics.micro_accuracy * 100.0);

    Ok(())
}

fn evaluate_command(args: EvaluateArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable = SerializableModel::load_from_file(&args.model)?;
    let model = serializable.to_trained_model()?;

    info!("Loading test data from: {:?}", args.data);
    let dataset = DigitDataset::from_file_with_schema(&args.data, serializable.schema)?;

    let metrics = model.evaluate_with_top_k(&dataset, args.top_k)?;

    print_metrics(&metrics);

    if args.detailed {
        println!(
            "    Top{}Accuracy:       {:.3}",
            metrics.top_k, metrics.top_k_accuracy
        );
        println!();
        println!("Per-class log-loss:");
        for (class, loss) in metrics.per_class_log_loss.iter().enumerate() {
            match loss {
                Some(loss) => println!("  {class}: {loss:.4}"),
                None => println!("  {class}: -"),
            }
        }
        println!();
        println!("Confusion matrix:");
        print!("{}", metrics.confusion_matrix);
    }

    Ok(())
}

fn predict_command(args: PredictArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable = SerializableModel::load_from_file(&args.model)?;
    let model = serializable.to_trained_model()?;

    let dataset = DigitDataset::from_file_with_schema(&args.data, serializable.schema)?;
    let mut engine = model.prediction_engine();

    for &row in &args.rows {
        if row >= dataset.len() {
            return Err(DigitError::InvalidParameter(format!(
                "row {row} is out of range for {} digits",
                dataset.len()
            )));
        }
        let digit = dataset.get_digit(row);
        let prediction = engine.predict(digit)?;

        println!(
            "Row {row}: predicted {} (actual {})",
            prediction.label, digit.label
        );
        print_scores(&prediction);
        println!();
    }

    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    info!("Loading model from: {:?}", args.model);
    let serializable = SerializableModel::load_from_file(&args.model)?;
    let model = serializable.to_trained_model()?;

    serializable.print_summary();

    println!("\nPer-class parameters:");
    let classifier = model.classifier();
    for class in 0..serializable.schema.num_classes {
        let weights = classifier.class_weights(class);
        let norm = weights.iter().map(|w| w * w).sum::<f64>().sqrt();
        println!(
            "  {class}: bias {:>10.4}, |w| {:>10.4}",
            classifier.bias()[class],
            norm
        );
    }

    Ok(())
}

fn print_metrics(metrics: &MulticlassMetrics) {
    println!("Evaluation metrics");
    println!("    MicroAccuracy:      {:.3}", metrics.micro_accuracy);
    println!("    MacroAccuracy:      {:.3}", metrics.macro_accuracy);
    println!("    LogLoss:            {:.3}", metrics.log_loss);
    println!("    LogLossReduction:   {:.3}", metrics.log_loss_reduction);
}

fn print_scores(prediction: &DigitPrediction) {
    for (class, score) in prediction.scores.iter().enumerate() {
        println!("  {class}: {:.2}%", score * 100.0);
    }
}
