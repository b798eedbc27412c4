//! Bluebook Pricing - bulldozer auction price prediction
//!
//! Ingests auction records, learns a reusable preprocessing artifact
//! (calendar features, category codes, medians, feature schema), splits by
//! sale year, trains or searches a random forest, scores it, and predicts
//! prices for unseen auctions with the exact training-time mappings.

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod dates;
pub mod encoding;
pub mod errors;
pub mod evaluate;
pub mod imputation;
pub mod ingest;
pub mod metrics;
pub mod predict;
pub mod preprocess;
pub mod search;
pub mod split;
pub mod table;
pub mod trainer;

use bluebook_forest::RandomForest;
use tracing::{info, warn};

pub use artifact::{ArtifactMetadata, ModelArtifact};
pub use config::PipelineConfig;
pub use dataset::{Dataset, FeatureStats};
pub use errors::{PipelineError, Result};
pub use evaluate::{evaluate, Scores};
pub use ingest::{read_csv, read_csv_path, CsvSchema};
pub use predict::{Predictions, Predictor};
pub use preprocess::{FittedPreprocessor, PreprocessSettings, Preprocessor};
pub use search::{RandomizedSearch, SearchOutcome, SearchSpace, Trial};
pub use split::{split_by_year, TemporalSplit};
pub use table::{Column, ColumnData, ColumnKind, Table};
pub use trainer::ModelTrainer;

/// What a training run produced
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub artifact: ModelArtifact,
    pub scores: Scores,
    pub top_features: Vec<(String, f64)>,
    /// BLAKE3 digest of the saved artifact
    pub digest: String,
}

/// Ingest, preprocess, split, fit (or search), score and save
pub fn run_training(config: &PipelineConfig) -> Result<TrainingReport> {
    config.validate()?;

    let raw = read_csv_path(&config.data.train_path, &config.training_schema())?;
    let settings = config.preprocess_settings();
    let year_column = settings.dates.year_column();

    let (fitted, processed) = Preprocessor::new(settings).fit_transform(raw)?;
    let split = split_by_year(&processed, &year_column, config.split.cutoff_year)?;

    let train = Dataset::from_table(&split.train, fitted.target_column())?;
    let valid = Dataset::from_table(&split.valid, fitted.target_column())?;

    let (model, cv_score): (RandomForest, Option<f64>) = if config.search.enabled {
        let outcome = RandomizedSearch::new(
            config.search.space.clone(),
            config.search.n_iter,
            config.search.cv_folds,
            config.search.seed,
        )
        .with_base(config.model.clone())
        .run(&train)?;
        info!("Best parameters: {:?}", outcome.best_params);
        (outcome.model, Some(outcome.best_score))
    } else {
        (ModelTrainer::new(config.model.clone()).train(&train)?, None)
    };

    let scores = evaluate(&model, &train, &valid)?;

    let top_features = model.top_features(config.report.top_features);
    info!("Top {} features:", top_features.len());
    for (name, importance) in &top_features {
        info!("  {:<28} {:.4}", name, importance);
    }

    let artifact = ModelArtifact::new(fitted, model, Some(scores), cv_score)?;
    let digest = artifact.save(&config.data.model_dir)?;

    Ok(TrainingReport {
        artifact,
        scores,
        top_features,
        digest,
    })
}

/// Load the saved artifact, predict the test CSV and write the output CSV
pub fn run_prediction(config: &PipelineConfig) -> Result<Predictions> {
    let artifact = ModelArtifact::load(&config.data.model_dir)?;
    if artifact.metadata.version != VERSION {
        warn!(
            "Model was written by version {}, running {}",
            artifact.metadata.version, VERSION
        );
    }

    let raw = read_csv_path(&config.data.test_path, &artifact.preprocessor.csv_schema())?;
    let predictor = Predictor::new(
        &artifact.preprocessor,
        &artifact.forest,
        config.data.id_column.clone(),
    )?;
    let predictions = predictor.predict(raw)?;
    predictions.write_csv(&config.data.output_path)?;

    Ok(predictions)
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
