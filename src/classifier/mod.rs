mod builder;
#[allow(clippy::module_inception)]
mod classifier;
mod error;

pub use builder::ClassifierBuilder;
pub use classifier::{Classification, Classifier, Outcome, DISTANCE_SENTINEL};
pub use error::ClassifierError;

use serde::Serialize;

/// A snapshot of a classifier's shape and pool state.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierInfo {
    pub num_instances: usize,
    pub arity: usize,
    pub k: usize,
    pub class_labels: Vec<String>,
    pub format: String,
    pub weighting: String,
    pub active_clones: usize,
}
