use std::sync::Arc;

use log::{debug, warn};
use serde::Serialize;

use super::bundle::ModelSlot;
use super::contract::{FeatureContract, RawFeatures};
use super::encoder::LabelEncoder;
use super::error::PredictorError;
use super::estimator::EstimatorOutput;
use super::scaler::StandardScaler;
use super::similarity::{SimilarCar, SimilarityIndex};
use crate::variants::{ModelVariant, TargetTransform};

/// The decoded model output.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Prediction {
    /// Estimated selling price, already mapped back from the training target scale
    Price(f64),
    /// Predicted price class with per-class probabilities in class order
    Class { label: String, scores: Vec<(String, f64)> },
}

/// Everything a page needs to render one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub variant: String,
    pub prediction: Prediction,
    /// Nearest reference records, closest first
    pub similar: Vec<SimilarCar>,
    /// Non-fatal observations about the request, such as an unrecognized category
    pub warnings: Vec<String>,
}

/// A thread-safe inference adapter for one model variant.
///
/// All state is read-only after [`PredictorBuilder::build`](super::PredictorBuilder::build),
/// so a `Predictor` can be shared across request handlers by reference or `Arc`.
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use carprice::{ModelVariant, Predictor, RawFeatures};
///
/// let predictor = Predictor::builder()
///     .with_variant(ModelVariant::A1)
///     .with_artifacts_dir("models")?
///     .build()?;
///
/// let result = predictor.predict(
///     &RawFeatures::new()
///         .with_numeric("year", 2019.0)
///         .with_numeric("max_power", 94.5)
///         .with_numeric("mileage", 14.6),
/// )?;
/// println!("{:?}", result.prediction);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Predictor {
    pub(crate) variant: ModelVariant,
    pub(crate) contract: Arc<FeatureContract>,
    pub(crate) scaler: Arc<StandardScaler>,
    pub(crate) model: ModelSlot,
    pub(crate) target: TargetTransform,
    pub(crate) target_encoder: Option<Arc<LabelEncoder>>,
    pub(crate) similarity: Option<Arc<SimilarityIndex>>,
    pub(crate) neighbors: usize,
}

// Compile-time verification of thread-safety
#[allow(dead_code)]
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Predictor>();
    }
};

impl Predictor {
    /// Creates a new PredictorBuilder for fluent construction
    pub fn builder() -> super::builder::PredictorBuilder {
        super::builder::PredictorBuilder::new()
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    pub fn contract(&self) -> &FeatureContract {
        &self.contract
    }

    pub fn is_available(&self) -> bool {
        self.model.is_available()
    }

    /// Returns information about the predictor's current state
    pub fn info(&self) -> super::PredictorInfo {
        super::PredictorInfo {
            variant: self.variant,
            columns: self.contract.columns().to_vec(),
            scaler_order: self.contract.scaler_order().to_vec(),
            model_available: self.model.is_available(),
            unavailable_reason: match &self.model {
                ModelSlot::Unavailable { reason } => Some(reason.clone()),
                ModelSlot::Real(_) => None,
            },
            reference_rows: self.similarity.as_ref().map(|index| index.len()).unwrap_or(0),
            neighbors: self.neighbors,
        }
    }

    /// Runs the full pipeline for one request: build the contract vector, scale
    /// the numeric subset, run the estimator, decode the output and look up
    /// similar reference records.
    ///
    /// # Errors
    /// - `ValidationError` if a required field is missing or not finite
    /// - `ModelUnavailable` if the estimator could not be loaded at startup
    /// - `PredictionError` if the pipeline fails on this input
    pub fn predict(&self, features: &RawFeatures) -> Result<PredictionResult, PredictorError> {
        let mut vector = self.contract.build_vector(features)?;

        let estimator = self.model.estimator().map_err(|e| {
            warn!("{} requested while its model is unavailable", self.variant);
            e
        })?;

        let mut warnings = Vec::new();
        if let (Some(category), Some(group)) = (&vector.unmatched_category, self.contract.one_hot()) {
            warnings.push(format!(
                "Unrecognized {} '{}' was encoded as all zeros",
                group.field, category
            ));
        }

        let query = self.contract.scale_vector(&mut vector, &self.scaler)?;
        let output = estimator.predict(vector.values.view())?;
        debug!("{} raw output: {:?}", self.variant, output);

        let prediction = match output {
            EstimatorOutput::Value(raw) => {
                let price = self.target.apply(raw);
                if !price.is_finite() {
                    return Err(PredictorError::PredictionError(format!(
                        "Model output {:e} does not map to a finite price",
                        raw
                    )));
                }
                Prediction::Price(price)
            }
            EstimatorOutput::Class { index, probabilities } => {
                let label = self.decode_class(index)?;
                let scores = probabilities
                    .iter()
                    .enumerate()
                    .map(|(i, &p)| Ok((self.decode_class(i)?, p)))
                    .collect::<Result<Vec<_>, PredictorError>>()?;
                Prediction::Class { label, scores }
            }
        };

        let similar = match &self.similarity {
            Some(index) => index.nearest(query.view(), self.neighbors)?,
            None => Vec::new(),
        };

        Ok(PredictionResult {
            variant: self.variant.to_string(),
            prediction,
            similar,
            warnings,
        })
    }

    fn decode_class(&self, index: usize) -> Result<String, PredictorError> {
        match &self.target_encoder {
            Some(encoder) => encoder.inverse_transform(index).map(str::to_string),
            None => Ok(index.to_string()),
        }
    }
}
