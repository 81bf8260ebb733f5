mod error;
mod utils;
pub mod builder;
pub mod bundle;
pub mod contract;
pub mod encoder;
pub mod estimator;
pub mod predictor;
pub mod scaler;
pub mod similarity;

pub use builder::PredictorBuilder;
pub use bundle::{ArtifactBundle, EncoderSet, ModelSlot};
pub use contract::{FeatureContract, FeatureVector, OneHotGroup, RawFeatures};
pub use encoder::LabelEncoder;
pub use error::PredictorError;
pub use estimator::{Estimator, EstimatorOutput, LinearRegression, LogisticRegression, PolynomialRegression, TaskKind};
pub use predictor::{Prediction, PredictionResult, Predictor};
pub use scaler::StandardScaler;
pub use similarity::{SimilarCar, SimilarityIndex, DEFAULT_NEIGHBORS};
pub use utils::format_thousands;

use crate::variants::ModelVariant;

/// Information about the current state and configuration of a predictor
#[derive(Debug, Clone)]
pub struct PredictorInfo {
    /// The variant being served
    pub variant: ModelVariant,
    /// Model input columns in contract order
    pub columns: Vec<String>,
    /// Columns passed through the scaler, in fit order
    pub scaler_order: Vec<String>,
    /// Whether a real estimator is loaded
    pub model_available: bool,
    /// Why the estimator is missing, when it is
    pub unavailable_reason: Option<String>,
    /// Rows in the similarity index
    pub reference_rows: usize,
    /// Number of similar records returned per prediction
    pub neighbors: usize,
}
