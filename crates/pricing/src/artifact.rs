//! Persisted model bundle
//!
//! The fitted preprocessor and forest travel together so inference always
//! replays the training-time mappings. The bundle is written as canonical
//! JSON next to a BLAKE3 digest file.

use bluebook_forest::serialization::{load_verified, save_with_digest};
use bluebook_forest::{ForestParams, RandomForest, Regressor};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::errors::{PipelineError, Result};
use crate::evaluate::Scores;
use crate::preprocess::FittedPreprocessor;

/// File name of the bundle inside a model directory
pub const ARTIFACT_FILE: &str = "model.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub n_features: usize,
    pub n_trees: usize,
    pub training_rows: usize,
    pub params: ForestParams,
    pub forest_hash: String,
    pub scores: Option<Scores>,
    /// Mean cross-validated RMSLE when the model came out of a search
    pub cv_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ArtifactMetadata,
    pub preprocessor: FittedPreprocessor,
    pub forest: RandomForest,
}

impl ModelArtifact {
    pub fn new(
        preprocessor: FittedPreprocessor,
        forest: RandomForest,
        scores: Option<Scores>,
        cv_score: Option<f64>,
    ) -> Result<Self> {
        let metadata = ArtifactMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            n_features: forest.n_features(),
            n_trees: forest.trees().len(),
            training_rows: forest.training_rows(),
            params: forest.params().clone(),
            forest_hash: forest.content_hash()?,
            scores,
            cv_score,
        };

        let artifact = Self {
            metadata,
            preprocessor,
            forest,
        };
        artifact.check_consistency()?;
        Ok(artifact)
    }

    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(ARTIFACT_FILE)
    }

    /// Write the bundle into `dir`; returns the digest
    pub fn save(&self, dir: &Path) -> Result<String> {
        let path = Self::path_in(dir);
        let digest = save_with_digest(&path, self)?;
        info!("Saved model to {} (blake3 {})", path.display(), digest);
        Ok(digest)
    }

    /// Read and verify the bundle stored in `dir`
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::path_in(dir);
        info!("Loading model from {}", path.display());

        let artifact: ModelArtifact = load_verified(&path)?;
        artifact.forest.validate()?;
        artifact.check_consistency()?;

        let hash = artifact.forest.content_hash()?;
        if hash != artifact.metadata.forest_hash {
            return Err(PipelineError::Forest(bluebook_forest::ForestError::HashMismatch {
                expected: artifact.metadata.forest_hash.clone(),
                actual: hash,
            }));
        }

        Ok(artifact)
    }

    fn check_consistency(&self) -> Result<()> {
        if self.preprocessor.feature_names() != self.forest.feature_names() {
            return Err(PipelineError::schema_mismatch(
                self.forest.feature_names(),
                self.preprocessor.feature_names(),
            ));
        }
        Ok(())
    }
}
