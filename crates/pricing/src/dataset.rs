//! Feature matrix and target vector handed to the forest

use tracing::debug;

use crate::errors::{PipelineError, Result};
use crate::table::Table;

/// Summary of one feature column
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureStats {
    pub name: String,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

/// Row-major features with their target values
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
}

impl Dataset {
    pub fn new(
        feature_names: Vec<String>,
        features: Vec<Vec<f64>>,
        targets: Vec<f64>,
    ) -> Result<Self> {
        if features.len() != targets.len() {
            return Err(PipelineError::InvalidTable(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        if let Some(row) = features.iter().position(|r| r.len() != feature_names.len()) {
            return Err(PipelineError::InvalidTable(format!(
                "row {row} has {} features, expected {}",
                features[row].len(),
                feature_names.len()
            )));
        }

        Ok(Self {
            feature_names,
            features,
            targets,
        })
    }

    /// Split a processed table into features (every other column) and target
    pub fn from_table(table: &Table, target: &str) -> Result<Self> {
        let feature_names: Vec<String> = table
            .column_names()
            .into_iter()
            .filter(|name| name != target)
            .collect();

        let features = table.feature_rows(&feature_names)?;
        let targets = table.numeric_values(target)?;

        debug!(
            rows = features.len(),
            features = feature_names.len(),
            "dataset extracted"
        );
        Self::new(feature_names, features, targets)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Subset of rows, in the order given
    pub fn take(&self, rows: &[usize]) -> Dataset {
        Dataset {
            feature_names: self.feature_names.clone(),
            features: rows.iter().map(|&r| self.features[r].clone()).collect(),
            targets: rows.iter().map(|&r| self.targets[r]).collect(),
        }
    }

    /// Per-column min, max and mean; empty when there are no rows
    pub fn feature_stats(&self) -> Vec<FeatureStats> {
        if self.is_empty() {
            return Vec::new();
        }

        let n = self.len() as f64;
        self.feature_names
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                let mut sum = 0.0;
                for row in &self.features {
                    min = min.min(row[col]);
                    max = max.max(row[col]);
                    sum += row[col];
                }
                FeatureStats {
                    name: name.clone(),
                    min,
                    max,
                    mean: sum / n,
                }
            })
            .collect()
    }
}
