//! Forest hyperparameters and their validation

use serde::{Deserialize, Serialize};

use crate::errors::{ForestError, Result};

/// How many candidate features each split considers
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum MaxFeatures {
    /// Every feature (the regression default)
    #[default]
    All,
    /// floor(sqrt(n_features))
    Sqrt,
    /// floor(log2(n_features))
    Log2,
    /// floor(fraction * n_features), fraction in (0, 1]
    Fraction(f64),
}

impl MaxFeatures {
    /// Resolve to a concrete feature count, never below 1 when features exist
    pub fn resolve(&self, n_features: usize) -> usize {
        if n_features == 0 {
            return 0;
        }

        let count = match *self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
            MaxFeatures::Fraction(fraction) => (fraction * n_features as f64).floor() as usize,
        };

        count.clamp(1, n_features)
    }
}

/// Random forest training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees in the ensemble
    pub n_estimators: usize,
    /// Maximum tree depth; `None` grows until the leaf constraints stop it
    pub max_depth: Option<usize>,
    /// Minimum rows a node needs before it may be split
    pub min_samples_split: usize,
    /// Minimum rows on each side of a split
    pub min_samples_leaf: usize,
    /// Candidate features per split
    pub max_features: MaxFeatures,
    /// Cap on rows drawn per tree when bootstrapping
    pub max_samples: Option<usize>,
    /// Draw rows with replacement for each tree
    pub bootstrap: bool,
    /// Seed for bootstrap draws and feature sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            max_samples: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Reject configurations the learner cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ForestError::InvalidParameters(
                "n_estimators must be at least 1".into(),
            ));
        }

        if self.max_depth == Some(0) {
            return Err(ForestError::InvalidParameters(
                "max_depth must be at least 1 when set".into(),
            ));
        }

        if self.min_samples_split < 2 {
            return Err(ForestError::InvalidParameters(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }

        if self.min_samples_leaf == 0 {
            return Err(ForestError::InvalidParameters(
                "min_samples_leaf must be at least 1".into(),
            ));
        }

        if let MaxFeatures::Fraction(fraction) = self.max_features {
            if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
                return Err(ForestError::InvalidParameters(format!(
                    "max_features fraction must be in (0, 1], got {fraction}"
                )));
            }
        }

        if self.max_samples == Some(0) {
            return Err(ForestError::InvalidParameters(
                "max_samples must be at least 1 when set".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_max_features() {
        assert_eq!(MaxFeatures::All.resolve(10), 10);
        assert_eq!(MaxFeatures::Sqrt.resolve(10), 3);
        assert_eq!(MaxFeatures::Log2.resolve(10), 3);
        assert_eq!(MaxFeatures::Fraction(0.5).resolve(10), 5);
        assert_eq!(MaxFeatures::Fraction(0.01).resolve(10), 1);
        assert_eq!(MaxFeatures::Sqrt.resolve(0), 0);
    }

    #[test]
    fn test_default_params_are_valid() {
        assert!(ForestParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_params_rejected() {
        let cases = [
            ForestParams {
                n_estimators: 0,
                ..ForestParams::default()
            },
            ForestParams {
                max_depth: Some(0),
                ..ForestParams::default()
            },
            ForestParams {
                min_samples_split: 1,
                ..ForestParams::default()
            },
            ForestParams {
                min_samples_leaf: 0,
                ..ForestParams::default()
            },
            ForestParams {
                max_features: MaxFeatures::Fraction(1.5),
                ..ForestParams::default()
            },
            ForestParams {
                max_samples: Some(0),
                ..ForestParams::default()
            },
        ];

        for params in cases {
            assert!(
                matches!(params.validate(), Err(ForestError::InvalidParameters(_))),
                "{params:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_max_features_serde_shape() {
        let json = serde_json::to_string(&MaxFeatures::Fraction(0.5)).unwrap();
        assert_eq!(json, r#"{"mode":"fraction","value":0.5}"#);

        let sqrt: MaxFeatures = serde_json::from_str(r#"{"mode":"sqrt"}"#).unwrap();
        assert_eq!(sqrt, MaxFeatures::Sqrt);
    }
}
