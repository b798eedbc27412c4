//! Bluebook CLI
//!
//! Trains the bulldozer price model and predicts auction prices.

use anyhow::{Context, Result};
use bluebook_pricing::{run_prediction, run_training, PipelineConfig};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "bluebook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Random-forest price model for bulldozer auctions", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the saved model
    #[arg(long, global = true)]
    model_dir: Option<PathBuf>,

    /// Verbose logging (overrides the configured level)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit the preprocessing artifact and forest, score it and save the model
    Train(TrainArgs),
    /// Predict prices for a test CSV with a saved model
    Predict(PredictArgs),
    /// Train, then predict, in one process
    Run {
        #[command(flatten)]
        train: TrainArgs,
        #[command(flatten)]
        predict: PredictArgs,
    },
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Training CSV (training and validation rows)
    #[arg(long)]
    train: Option<PathBuf>,

    /// Sale year held out for validation
    #[arg(long)]
    cutoff_year: Option<i64>,

    /// Run the randomized hyperparameter search
    #[arg(long)]
    search: bool,

    /// Number of trees
    #[arg(long)]
    trees: Option<usize>,

    /// Random seed for the forest
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct PredictArgs {
    /// Test CSV to predict
    #[arg(long)]
    test: Option<PathBuf>,

    /// Where to write the predictions CSV
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn apply_train_args(config: &mut PipelineConfig, args: &TrainArgs) {
    if let Some(path) = &args.train {
        config.data.train_path = path.clone();
    }
    if let Some(year) = args.cutoff_year {
        config.split.cutoff_year = year;
    }
    if args.search {
        config.search.enabled = true;
    }
    if let Some(trees) = args.trees {
        config.model.n_estimators = trees;
    }
    if let Some(seed) = args.seed {
        config.model.seed = seed;
    }
}

fn apply_predict_args(config: &mut PipelineConfig, args: &PredictArgs) {
    if let Some(path) = &args.test {
        config.data.test_path = path.clone();
    }
    if let Some(path) = &args.output {
        config.data.output_path = path.clone();
    }
}

fn train(config: &PipelineConfig) -> Result<()> {
    info!("Training from: {}", config.data.train_path.display());
    let report = run_training(config).context("Training failed")?;

    info!("Training complete!");
    info!("  Trees: {}", report.artifact.metadata.n_trees);
    info!("  Features: {}", report.artifact.metadata.n_features);
    info!("  Valid RMSLE: {:.5}", report.scores.valid_rmsle);
    info!("  Model hash: {}", report.digest);
    Ok(())
}

fn predict(config: &PipelineConfig) -> Result<()> {
    info!("Predicting: {}", config.data.test_path.display());
    let predictions = run_prediction(config).context("Prediction failed")?;

    info!(
        "Wrote {} predictions to {}",
        predictions.len(),
        config.data.output_path.display()
    );
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid BLUEBOOK_* environment variable")?;

    if let Some(dir) = &cli.model_dir {
        config.data.model_dir = dir.clone();
    }
    match &cli.command {
        Command::Train(args) => apply_train_args(&mut config, args),
        Command::Predict(args) => apply_predict_args(&mut config, args),
        Command::Run { train, predict } => {
            apply_train_args(&mut config, train);
            apply_predict_args(&mut config, predict);
        }
    }

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        config.log_level().context("Invalid logging.level")?
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Bluebook price model v{}", env!("CARGO_PKG_VERSION"));
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Command::Train(_) => train(&config),
        Command::Predict(_) => predict(&config),
        Command::Run { .. } => {
            train(&config)?;
            predict(&config)
        }
    }
}
