//! Randomized hyperparameter search with k-fold cross-validation
//!
//! Configurations are drawn from a discrete [`SearchSpace`] with a seeded
//! RNG, each one is scored by mean fold RMSLE on contiguous folds, and the
//! best one is refit on the full training split. Any failure while scoring a
//! configuration aborts the search.

use bluebook_forest::{ForestParams, MaxFeatures, RandomForest, Regressor};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::dataset::Dataset;
use crate::errors::{PipelineError, Result};
use crate::metrics::root_mean_squared_log_error;
use crate::trainer::ModelTrainer;

/// Candidate values per hyperparameter
///
/// In `max_depth` and `max_samples`, 0 stands for "unbounded".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSpace {
    pub n_estimators: Vec<usize>,
    pub max_depth: Vec<usize>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub max_features: Vec<MaxFeatures>,
    pub max_samples: Vec<usize>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self {
            n_estimators: (10..100).step_by(10).collect(),
            max_depth: vec![0, 3, 5, 10],
            min_samples_split: (2..20).step_by(2).collect(),
            min_samples_leaf: (1..20).step_by(2).collect(),
            max_features: vec![MaxFeatures::Fraction(0.5), MaxFeatures::Sqrt, MaxFeatures::All],
            max_samples: vec![10_000],
        }
    }
}

fn pick<T: Copy>(values: &[T], name: &str, rng: &mut StdRng) -> Result<T> {
    values
        .choose(rng)
        .copied()
        .ok_or_else(|| PipelineError::Search(format!("search space for '{name}' is empty")))
}

fn bounded(value: usize) -> Option<usize> {
    (value > 0).then_some(value)
}

impl SearchSpace {
    /// Draw one configuration; fields outside the space come from `base`
    pub fn sample(&self, base: &ForestParams, rng: &mut StdRng) -> Result<ForestParams> {
        Ok(ForestParams {
            n_estimators: pick(&self.n_estimators, "n_estimators", rng)?,
            max_depth: bounded(pick(&self.max_depth, "max_depth", rng)?),
            min_samples_split: pick(&self.min_samples_split, "min_samples_split", rng)?,
            min_samples_leaf: pick(&self.min_samples_leaf, "min_samples_leaf", rng)?,
            max_features: pick(&self.max_features, "max_features", rng)?,
            max_samples: bounded(pick(&self.max_samples, "max_samples", rng)?),
            ..base.clone()
        })
    }

    /// Number of distinct configurations in the space
    pub fn size(&self) -> usize {
        self.n_estimators.len()
            * self.max_depth.len()
            * self.min_samples_split.len()
            * self.min_samples_leaf.len()
            * self.max_features.len()
            * self.max_samples.len()
    }
}

/// Contiguous fold boundaries; the first `n % k` folds get one extra row
pub fn kfold_ranges(n: usize, k: usize) -> Vec<std::ops::Range<usize>> {
    let base = n / k;
    let extra = n % k;

    let mut start = 0;
    (0..k)
        .map(|fold| {
            let len = base + usize::from(fold < extra);
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// One evaluated configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub index: usize,
    pub params: ForestParams,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
}

#[derive(Debug)]
pub struct SearchOutcome {
    pub best_params: ForestParams,
    pub best_score: f64,
    pub trials: Vec<Trial>,
    /// Best configuration refit on the full dataset
    pub model: RandomForest,
}

#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    pub space: SearchSpace,
    pub n_iter: usize,
    pub cv_folds: usize,
    /// Seed for drawing configurations
    pub seed: u64,
    /// Values for the fields the space does not cover
    pub base: ForestParams,
}

impl RandomizedSearch {
    pub fn new(space: SearchSpace, n_iter: usize, cv_folds: usize, seed: u64) -> Self {
        Self {
            space,
            n_iter,
            cv_folds,
            seed,
            base: ForestParams::default(),
        }
    }

    pub fn with_base(mut self, base: ForestParams) -> Self {
        self.base = base;
        self
    }

    #[instrument(skip_all, fields(rows = data.len(), n_iter = self.n_iter, folds = self.cv_folds))]
    pub fn run(&self, data: &Dataset) -> Result<SearchOutcome> {
        if data.is_empty() {
            return Err(PipelineError::DegenerateSplit(
                "cannot search on an empty training split".into(),
            ));
        }
        if self.n_iter == 0 {
            return Err(PipelineError::Search("n_iter must be at least 1".into()));
        }
        if self.cv_folds < 2 {
            return Err(PipelineError::Search(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if data.len() < self.cv_folds {
            return Err(PipelineError::Search(format!(
                "{} rows cannot be split into {} folds",
                data.len(),
                self.cv_folds
            )));
        }

        info!(
            "Randomized search: {} of {} configurations, {}-fold CV",
            self.n_iter,
            self.space.size(),
            self.cv_folds
        );

        let folds = kfold_ranges(data.len(), self.cv_folds);
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trials = Vec::with_capacity(self.n_iter);

        for index in 0..self.n_iter {
            let params = self.space.sample(&self.base, &mut rng)?;
            params.validate()?;

            let fold_scores = folds
                .iter()
                .map(|fold| score_fold(&params, data, fold.clone()))
                .collect::<Result<Vec<f64>>>()?;
            let mean_score = fold_scores.iter().sum::<f64>() / fold_scores.len() as f64;

            info!("Trial {}/{}: mean RMSLE {:.5}", index + 1, self.n_iter, mean_score);
            debug!(?params, ?fold_scores, "trial detail");

            trials.push(Trial {
                index,
                params,
                fold_scores,
                mean_score,
            });
        }

        let best = trials
            .iter()
            .min_by(|a, b| a.mean_score.total_cmp(&b.mean_score))
            .ok_or_else(|| PipelineError::Search("no trials were run".into()))?;
        let best_params = best.params.clone();
        let best_score = best.mean_score;

        info!("Best trial {}: mean RMSLE {:.5}", best.index + 1, best_score);

        let model = ModelTrainer::new(best_params.clone()).train(data)?;

        Ok(SearchOutcome {
            best_params,
            best_score,
            trials,
            model,
        })
    }
}

fn score_fold(
    params: &ForestParams,
    data: &Dataset,
    held_out: std::ops::Range<usize>,
) -> Result<f64> {
    let train_rows: Vec<usize> = (0..data.len()).filter(|r| !held_out.contains(r)).collect();
    let valid_rows: Vec<usize> = held_out.collect();

    let train = data.take(&train_rows);
    let valid = data.take(&valid_rows);

    let model = ModelTrainer::new(params.clone()).train(&train)?;
    let predicted = model.predict(&valid.features)?;
    root_mean_squared_log_error(&valid.targets, &predicted)
}
