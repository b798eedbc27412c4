//! Fixed-hyperparameter forest training

use bluebook_forest::{ForestParams, RandomForest};
use tracing::info;

use crate::dataset::Dataset;
use crate::errors::{PipelineError, Result};

/// Fits one forest with a fixed configuration
pub struct ModelTrainer {
    params: ForestParams,
}

impl ModelTrainer {
    pub fn new(params: ForestParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Train on the given dataset
    pub fn train(&self, dataset: &Dataset) -> Result<RandomForest> {
        if dataset.is_empty() {
            return Err(PipelineError::DegenerateSplit(
                "training split has no rows".into(),
            ));
        }

        info!(
            "Training {} trees on {} rows x {} features",
            self.params.n_estimators,
            dataset.len(),
            dataset.n_features()
        );

        let forest = RandomForest::fit(
            self.params.clone(),
            dataset.feature_names.clone(),
            &dataset.features,
            &dataset.targets,
        )?;

        info!("Training complete: {} trees", forest.trees().len());
        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluebook_forest::{ForestError, Regressor};

    fn dataset(n: usize) -> Dataset {
        let features = (0..n).map(|i| vec![i as f64]).collect();
        let targets = (0..n).map(|i| 10.0 * i as f64).collect();
        Dataset::new(vec!["saleYear".into()], features, targets).unwrap()
    }

    fn params() -> ForestParams {
        ForestParams {
            n_estimators: 5,
            ..ForestParams::default()
        }
    }

    #[test]
    fn test_train_fits_forest() {
        let forest = ModelTrainer::new(params()).train(&dataset(20)).unwrap();

        assert_eq!(forest.trees().len(), 5);
        assert_eq!(forest.feature_names(), &["saleYear".to_string()]);
    }

    #[test]
    fn test_empty_training_split_rejected() {
        let err = ModelTrainer::new(params()).train(&dataset(0)).unwrap_err();
        assert!(matches!(err, PipelineError::DegenerateSplit(_)));
    }

    #[test]
    fn test_invalid_params_propagate() {
        let bad = ForestParams {
            min_samples_split: 1,
            ..params()
        };
        let err = ModelTrainer::new(bad).train(&dataset(5)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Forest(ForestError::InvalidParameters(_))
        ));
    }
}
