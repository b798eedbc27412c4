//! Bluebook Forest - seeded random-forest regression
//!
//! Provides a bagged CART regressor with feature subsampling, impurity-based
//! feature importances, and canonical JSON persistence with BLAKE3 digests.

pub mod cart;
pub mod errors;
pub mod forest;
pub mod params;
pub mod serialization;
pub mod tree;

pub use errors::{ForestError, Result};
pub use forest::{RandomForest, Regressor};
pub use params::{ForestParams, MaxFeatures};
pub use tree::{Node, Tree};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
