use std::fmt;

/// Represents the different types of errors that can occur in the classifier.
#[derive(Debug)]
pub enum ClassifierError {
    /// Error occurred during the build phase
    BuildError(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
    /// Failed to create a per-thread working clone of the model.
    /// Fatal for the affected call only; the pool and other threads'
    /// clones are unaffected.
    CloneError(String),
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::CloneError(msg) => write!(f, "Clone error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}
