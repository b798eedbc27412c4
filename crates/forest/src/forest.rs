//! Random forest regressor
//!
//! Bagged CART trees with per-split feature subsampling. Each tree gets its
//! own RNG seeded from a master stream before the parallel section, so the
//! fitted forest depends only on the data and `ForestParams::seed`.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

use crate::cart::{CartBuilder, TreeConfig};
use crate::errors::{ForestError, Result};
use crate::params::ForestParams;
use crate::serialization::canonical_digest;
use crate::tree::Tree;

/// The contract the pricing pipeline relies on
pub trait Regressor {
    /// Names of the features, in the column order `predict` expects
    fn feature_names(&self) -> &[String];

    /// One prediction per feature row
    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Relative importance per feature, summing to 1 when any split exists
    fn feature_importances(&self) -> BTreeMap<String, f64>;
}

/// A fitted random forest
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RandomForest {
    params: ForestParams,
    feature_names: Vec<String>,
    trees: Vec<Tree>,
    importances: Vec<f64>,
    training_rows: usize,
}

impl RandomForest {
    /// Fit a forest on row-major features
    #[instrument(skip_all, fields(rows = features.len(), trees = params.n_estimators))]
    pub fn fit(
        params: ForestParams,
        feature_names: Vec<String>,
        features: &[Vec<f64>],
        targets: &[f64],
    ) -> Result<Self> {
        params.validate()?;

        if features.is_empty() {
            return Err(ForestError::EmptyTrainingSet);
        }
        if features.len() != targets.len() {
            return Err(ForestError::ShapeMismatch(format!(
                "{} feature rows but {} targets",
                features.len(),
                targets.len()
            )));
        }
        let n_features = feature_names.len();
        if let Some((row, found)) = features
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len != n_features)
        {
            return Err(ForestError::ShapeMismatch(format!(
                "row {row} has {found} features, expected {n_features}"
            )));
        }
        if let Some(row) = targets.iter().position(|t| !t.is_finite()) {
            return Err(ForestError::ShapeMismatch(format!(
                "target at row {row} is not finite"
            )));
        }

        let n_rows = features.len();
        let draw = match params.max_samples {
            Some(cap) if params.bootstrap => {
                if cap > n_rows {
                    debug!(cap, n_rows, "max_samples exceeds row count, drawing every row");
                }
                cap.min(n_rows)
            }
            _ => n_rows,
        };

        let tree_config = TreeConfig {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features.resolve(n_features),
        };

        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();

        let builder = CartBuilder::new(features, targets, tree_config);
        let grown: Vec<_> = seeds
            .into_par_iter()
            .enumerate()
            .map(|(tree_idx, seed)| {
                let mut rng = StdRng::seed_from_u64(seed);
                let rows: Vec<usize> = if params.bootstrap {
                    (0..draw).map(|_| rng.gen_range(0..n_rows)).collect()
                } else {
                    (0..n_rows).collect()
                };
                let tree = builder.build(rows, &mut rng);
                debug!(
                    tree = tree_idx + 1,
                    nodes = tree.tree.nodes.len(),
                    depth = tree.tree.depth(),
                    "tree grown"
                );
                tree
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(grown.len());
        for grown_tree in grown {
            let total: f64 = grown_tree.importances.iter().sum();
            if total > 0.0 {
                for (acc, value) in importances.iter_mut().zip(&grown_tree.importances) {
                    *acc += value / total;
                }
            }
            trees.push(grown_tree.tree);
        }
        normalize(&mut importances);

        info!(
            trees = trees.len(),
            rows = n_rows,
            features = n_features,
            rows_per_tree = draw,
            "forest fitted"
        );

        Ok(Self {
            params,
            feature_names,
            trees,
            importances,
            training_rows: n_rows,
        })
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn training_rows(&self) -> usize {
        self.training_rows
    }

    /// Average of the tree outputs for a single row
    pub fn predict_row(&self, row: &[f64]) -> Result<f64> {
        if row.len() != self.n_features() {
            return Err(ForestError::ShapeMismatch(format!(
                "row has {} features, model expects {}",
                row.len(),
                self.n_features()
            )));
        }
        Ok(self.mean_output(row))
    }

    fn mean_output(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.evaluate(row)).sum();
        sum / self.trees.len() as f64
    }

    /// The `n` most important features, highest first (ties by name)
    pub fn top_features(&self, n: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self.feature_importances().into_iter().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(n);
        ranked
    }

    /// Hex BLAKE3 digest over the canonical form of the trees
    pub fn content_hash(&self) -> Result<String> {
        canonical_digest(&self.trees)
    }

    /// Structural checks for a forest read back from disk
    pub fn validate(&self) -> Result<()> {
        self.params.validate()?;

        if self.trees.is_empty() {
            return Err(ForestError::InvalidParameters("forest has no trees".into()));
        }
        if self.importances.len() != self.feature_names.len() {
            return Err(ForestError::ShapeMismatch(format!(
                "{} importances for {} features",
                self.importances.len(),
                self.feature_names.len()
            )));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features())
                .map_err(|reason| ForestError::ShapeMismatch(format!("tree {i}: {reason}")))?;
        }

        Ok(())
    }
}

impl Regressor for RandomForest {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &[Vec<f64>]) -> Result<Vec<f64>> {
        if let Some(row) = features.iter().position(|r| r.len() != self.n_features()) {
            return Err(ForestError::ShapeMismatch(format!(
                "row {row} has {} features, model expects {}",
                features[row].len(),
                self.n_features()
            )));
        }

        Ok(features.par_iter().map(|row| self.mean_output(row)).collect())
    }

    fn feature_importances(&self) -> BTreeMap<String, f64> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.importances.iter().copied())
            .collect()
    }
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for value in values.iter_mut() {
            *value /= total;
        }
    }
}
