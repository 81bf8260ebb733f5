use std::fmt;

/// Represents the different types of errors that can occur while serving a prediction.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictorError {
    /// Error occurred due to missing or invalid request fields
    ValidationError(String),
    /// Error occurred while reading or decoding an artifact file
    ArtifactError(String),
    /// Error occurred during the build phase, including contract mismatches
    BuildError(String),
    /// Error occurred because the estimator has an invalid shape
    ModelError(String),
    /// The estimator could not be obtained at startup and no prediction is possible
    ModelUnavailable(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred while loading the reference dataset
    DatasetError(String),
}

impl fmt::Display for PredictorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            Self::ArtifactError(msg) => write!(f, "Artifact error: {}", msg),
            Self::BuildError(msg) => write!(f, "Build error: {}", msg),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::ModelUnavailable(msg) => write!(f, "Model unavailable: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::DatasetError(msg) => write!(f, "Dataset error: {}", msg),
        }
    }
}

impl PredictorError {
    /// The message without its category prefix
    pub fn detail(&self) -> &str {
        match self {
            Self::ValidationError(msg)
            | Self::ArtifactError(msg)
            | Self::BuildError(msg)
            | Self::ModelError(msg)
            | Self::ModelUnavailable(msg)
            | Self::PredictionError(msg)
            | Self::DatasetError(msg) => msg,
        }
    }
}

impl std::error::Error for PredictorError {}

impl From<ndarray::ShapeError> for PredictorError {
    fn from(err: ndarray::ShapeError) -> Self {
        PredictorError::PredictionError(err.to_string())
    }
}
