//! Pipeline configuration
//!
//! Layered as defaults, then a TOML file, then `BLUEBOOK_*` environment
//! variables; the CLI applies its flags last.

use bluebook_forest::{ForestParams, MaxFeatures};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, Level};

use crate::dates::DateExpander;
use crate::errors::{PipelineError, Result};
use crate::ingest::CsvSchema;
use crate::preprocess::PreprocessSettings;
use crate::search::SearchSpace;

/// Prefix of the environment variables read by `apply_env_overrides`
pub const ENV_PREFIX: &str = "BLUEBOOK_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub split: SplitConfig,
    /// Forest hyperparameters; fields absent from the file take the learner
    /// defaults
    pub model: ForestParams,
    pub search: SearchConfig,
    pub report: ReportConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Combined training and validation CSV
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub output_path: PathBuf,
    pub model_dir: PathBuf,
    pub date_column: String,
    /// Prefix of the derived calendar columns
    pub date_prefix: String,
    pub target_column: String,
    pub id_column: String,
    /// Extra columns that must parse as numbers
    pub numeric_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Sale year that goes to validation
    pub cutoff_year: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub enabled: bool,
    pub n_iter: usize,
    pub cv_folds: usize,
    pub seed: u64,
    pub space: SearchSpace,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Number of feature importances logged after training
    pub top_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

/// Hyperparameters of the tuned Bluebook model
pub fn tuned_forest_params() -> ForestParams {
    ForestParams {
        n_estimators: 40,
        max_depth: None,
        min_samples_split: 14,
        min_samples_leaf: 1,
        max_features: MaxFeatures::Fraction(0.5),
        max_samples: None,
        bootstrap: true,
        seed: 42,
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data: DataConfig::default(),
            split: SplitConfig::default(),
            model: tuned_forest_params(),
            search: SearchConfig::default(),
            report: ReportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("data/bluebook-for-bulldozers/TrainAndValid.csv"),
            test_path: PathBuf::from("data/bluebook-for-bulldozers/Test.csv"),
            output_path: PathBuf::from("data/test_predictions.csv"),
            model_dir: PathBuf::from("models/bluebook"),
            date_column: "saledate".to_string(),
            date_prefix: "sale".to_string(),
            target_column: "SalePrice".to_string(),
            id_column: "SalesID".to_string(),
            numeric_columns: Vec::new(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { cutoff_year: 2012 }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            n_iter: 2,
            cv_folds: 5,
            seed: 42,
            space: SearchSpace::default(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { top_features: 20 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| PipelineError::Config(format!("invalid value '{raw}' for {key}")))
}

impl PipelineConfig {
    /// Load a TOML file over the defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| PipelineError::Config(format!("failed to parse config: {e}")))
    }

    /// Apply `BLUEBOOK_*` variables from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<usize> {
        self.apply_overrides(std::env::vars())
    }

    /// Apply `BLUEBOOK_*` key/value pairs; other keys are ignored
    ///
    /// Returns how many overrides were applied.
    pub fn apply_overrides<I, K, V>(&mut self, vars: I) -> Result<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut applied = 0;

        for (key, value) in vars {
            let key = key.as_ref();
            let value = value.as_ref();
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };

            match name {
                "TRAIN_PATH" => self.data.train_path = PathBuf::from(value),
                "TEST_PATH" => self.data.test_path = PathBuf::from(value),
                "OUTPUT_PATH" => self.data.output_path = PathBuf::from(value),
                "MODEL_DIR" => self.data.model_dir = PathBuf::from(value),
                "CUTOFF_YEAR" => self.split.cutoff_year = parse_value(key, value)?,
                "N_ESTIMATORS" => self.model.n_estimators = parse_value(key, value)?,
                "SEED" => self.model.seed = parse_value(key, value)?,
                "SEARCH_ENABLED" => self.search.enabled = parse_value(key, value)?,
                "SEARCH_ITER" => self.search.n_iter = parse_value(key, value)?,
                "SEARCH_FOLDS" => self.search.cv_folds = parse_value(key, value)?,
                "LOG_LEVEL" => self.logging.level = value.to_string(),
                _ => continue,
            }
            applied += 1;
        }

        if applied > 0 {
            info!("Applied {} environment overrides", applied);
        }
        Ok(applied)
    }

    /// Reject configurations that cannot run
    pub fn validate(&self) -> Result<()> {
        let columns = [
            ("date_column", &self.data.date_column),
            ("target_column", &self.data.target_column),
            ("id_column", &self.data.id_column),
        ];
        for (field, value) in columns {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("data.{field} must not be empty")));
            }
        }
        if self.data.target_column == self.data.date_column {
            return Err(PipelineError::Config(
                "target column cannot also be the date column".into(),
            ));
        }

        if self.split.cutoff_year <= 0 {
            return Err(PipelineError::Config(format!(
                "split.cutoff_year must be positive, got {}",
                self.split.cutoff_year
            )));
        }

        self.model
            .validate()
            .map_err(|e| PipelineError::Config(format!("model: {e}")))?;

        if self.search.enabled {
            if self.search.n_iter == 0 {
                return Err(PipelineError::Config("search.n_iter must be at least 1".into()));
            }
            if self.search.cv_folds < 2 {
                return Err(PipelineError::Config(
                    "search.cv_folds must be at least 2".into(),
                ));
            }
            if self.search.space.size() == 0 {
                return Err(PipelineError::Config(
                    "search.space has an empty candidate list".into(),
                ));
            }
        }

        self.log_level()?;
        Ok(())
    }

    pub fn log_level(&self) -> Result<Level> {
        Level::from_str(self.logging.level.trim()).map_err(|_| {
            PipelineError::Config(format!("unknown log level '{}'", self.logging.level))
        })
    }

    pub fn preprocess_settings(&self) -> PreprocessSettings {
        PreprocessSettings {
            dates: DateExpander::new(&self.data.date_column, &self.data.date_prefix),
            target_column: self.data.target_column.clone(),
            sort_by_date: true,
        }
    }

    /// Typing hints for the training CSV
    pub fn training_schema(&self) -> CsvSchema {
        CsvSchema::default()
            .with_date_column(self.data.date_column.clone())
            .with_numeric([self.data.target_column.clone()])
            .with_numeric(self.data.numeric_columns.iter().cloned())
    }
}
