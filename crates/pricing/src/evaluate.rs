//! Training and validation scores

use bluebook_forest::Regressor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::dataset::Dataset;
use crate::errors::{PipelineError, Result};
use crate::metrics::{mean_absolute_error, r2_score, root_mean_squared_log_error};

/// MAE, RMSLE and R² on both splits
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub training_mae: f64,
    pub valid_mae: f64,
    pub training_rmsle: f64,
    pub valid_rmsle: f64,
    pub training_r2: f64,
    pub valid_r2: f64,
}

impl Scores {
    /// The six scores under their report names
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            ("Training MAE", self.training_mae),
            ("Valid MAE", self.valid_mae),
            ("Training RMSLE", self.training_rmsle),
            ("Valid RMSLE", self.valid_rmsle),
            ("Training R^2", self.training_r2),
            ("Valid R^2", self.valid_r2),
        ])
    }
}

/// Predictions on a dataset after checking its columns match the model
pub fn predict_dataset<M: Regressor>(model: &M, data: &Dataset) -> Result<Vec<f64>> {
    if model.feature_names() != data.feature_names.as_slice() {
        return Err(PipelineError::schema_mismatch(
            model.feature_names(),
            &data.feature_names,
        ));
    }

    Ok(model.predict(&data.features)?)
}

fn score_split<M: Regressor>(model: &M, data: &Dataset, split: &str) -> Result<(f64, f64, f64)> {
    if data.is_empty() {
        return Err(PipelineError::DegenerateSplit(format!(
            "cannot score an empty {split} split"
        )));
    }

    let predicted = predict_dataset(model, data)?;
    Ok((
        mean_absolute_error(&data.targets, &predicted)?,
        root_mean_squared_log_error(&data.targets, &predicted)?,
        r2_score(&data.targets, &predicted)?,
    ))
}

/// Score a fitted model on both splits
pub fn evaluate<M: Regressor>(model: &M, train: &Dataset, valid: &Dataset) -> Result<Scores> {
    let (training_mae, training_rmsle, training_r2) = score_split(model, train, "training")?;
    let (valid_mae, valid_rmsle, valid_r2) = score_split(model, valid, "validation")?;

    let scores = Scores {
        training_mae,
        valid_mae,
        training_rmsle,
        valid_rmsle,
        training_r2,
        valid_r2,
    };
    for (name, value) in scores.to_map() {
        info!("{}: {:.4}", name, value);
    }
    Ok(scores)
}
