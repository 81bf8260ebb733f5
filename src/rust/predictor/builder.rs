use std::path::Path;
use std::sync::Arc;

use log::{info, warn};

use super::bundle::{read_artifact, ArtifactBundle, EncoderSet, ModelSlot};
use super::contract::FeatureContract;
use super::error::PredictorError;
use super::estimator::Estimator;
use super::predictor::Predictor;
use super::scaler::StandardScaler;
use super::similarity::{SimilarityIndex, DEFAULT_NEIGHBORS};
use crate::dataset::CarRecord;
use crate::variants::ModelVariant;

/// A builder for constructing a Predictor with a fluent interface.
///
/// Artifacts are checked against the feature contract when [`build`](Self::build)
/// runs, so a scaler fit on a different column order or a model of the wrong
/// width is rejected at startup instead of producing wrong prices.
#[derive(Debug)]
pub struct PredictorBuilder {
    variant: Option<ModelVariant>,
    contract: Option<FeatureContract>,
    scaler: Option<StandardScaler>,
    model: Option<ModelSlot>,
    encoders: EncoderSet,
    reference: Option<Arc<Vec<CarRecord>>>,
    neighbors: usize,
}

impl Default for PredictorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorBuilder {
    /// Creates a new empty PredictorBuilder instance
    pub fn new() -> Self {
        Self {
            variant: None,
            contract: None,
            scaler: None,
            model: None,
            encoders: EncoderSet::default(),
            reference: None,
            neighbors: DEFAULT_NEIGHBORS,
        }
    }

    /// Sets the model variant. The variant's contract is used unless
    /// [`with_contract`](Self::with_contract) overrides it.
    pub fn with_variant(mut self, variant: ModelVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Overrides the feature contract of the variant
    pub fn with_contract(mut self, contract: FeatureContract) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Uses every artifact from a bundle.
    ///
    /// # Errors
    /// - `BuildError` if a scaler or model has already been set
    pub fn with_bundle(mut self, bundle: ArtifactBundle) -> Result<Self, PredictorError> {
        if self.scaler.is_some() || self.model.is_some() {
            return Err(PredictorError::BuildError("Model and scaler already set".to_string()));
        }
        self.scaler = Some(bundle.scaler);
        self.model = Some(ModelSlot::from(bundle.estimator));
        self.encoders = bundle.encoders;
        Ok(self)
    }

    /// Loads the variant's model and scaler files from `dir`.
    ///
    /// # Errors
    /// - `BuildError` if no variant is set or the variant's model comes from the registry
    /// - `ArtifactError` if a file is missing or malformed
    pub fn with_artifacts_dir(self, dir: impl AsRef<Path>) -> Result<Self, PredictorError> {
        let variant = self
            .variant
            .ok_or_else(|| PredictorError::BuildError("Variant must be set before loading artifacts".into()))?;
        let info = variant.info();
        let model_file = info.model_file.ok_or_else(|| {
            PredictorError::BuildError(format!("{} has no local model file; load it from the registry", variant))
        })?;

        let dir = dir.as_ref();
        let bundle = ArtifactBundle::from_files(dir.join(model_file), dir.join(info.scaler_file))?;
        self.with_bundle(bundle)
    }

    /// Loads only the scaler from `path`
    pub fn with_scaler_file(self, path: impl AsRef<Path>) -> Result<Self, PredictorError> {
        let scaler: StandardScaler = read_artifact(path.as_ref())?;
        scaler.validate()?;
        self.with_scaler(scaler)
    }

    pub fn with_scaler(mut self, scaler: StandardScaler) -> Result<Self, PredictorError> {
        if self.scaler.is_some() {
            return Err(PredictorError::BuildError("Scaler already set".to_string()));
        }
        self.scaler = Some(scaler);
        Ok(self)
    }

    pub fn with_model(mut self, estimator: Estimator) -> Self {
        self.model = Some(ModelSlot::from(estimator));
        self
    }

    /// Marks the model as unavailable. The predictor still builds, and every
    /// prediction fails with `ModelUnavailable` carrying `reason`.
    pub fn with_unavailable_model(mut self, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!("Building predictor without a model: {}", reason);
        self.model = Some(ModelSlot::unavailable(reason));
        self
    }

    pub fn with_encoders(mut self, encoders: EncoderSet) -> Self {
        self.encoders = encoders;
        self
    }

    /// Loads label and target encoders from `path`
    pub fn with_encoder_file(self, path: impl AsRef<Path>) -> Result<Self, PredictorError> {
        let encoders: EncoderSet = read_artifact(path.as_ref())?;
        encoders.validate()?;
        Ok(self.with_encoders(encoders))
    }

    /// Enables similarity lookup over the given records
    pub fn with_reference_dataset(mut self, records: Arc<Vec<CarRecord>>) -> Self {
        self.reference = Some(records);
        self
    }

    /// Sets how many similar records are returned (default 5)
    pub fn with_neighbors(mut self, neighbors: usize) -> Self {
        self.neighbors = neighbors;
        self
    }

    /// Builds and returns the final Predictor instance
    ///
    /// # Errors
    /// - `BuildError` if the variant, scaler or model is missing
    /// - `BuildError` if the artifacts disagree with the feature contract
    /// - `ModelError` if the estimator parameters are malformed
    pub fn build(self) -> Result<Predictor, PredictorError> {
        let variant = self
            .variant
            .ok_or_else(|| PredictorError::BuildError("Variant must be set".to_string()))?;
        let contract = self.contract.unwrap_or_else(|| variant.contract().clone());
        contract.validate()?;

        let scaler = self
            .scaler
            .ok_or_else(|| PredictorError::BuildError("No scaler loaded".to_string()))?;
        scaler.validate()?;
        Self::validate_scaler(&contract, &scaler)?;

        let model = self
            .model
            .ok_or_else(|| PredictorError::BuildError("No model loaded".to_string()))?;
        if let ModelSlot::Real(estimator) = &model {
            Self::validate_model(variant, &contract, estimator, &self.encoders)?;
        }
        Self::validate_encoders(&contract, &self.encoders)?;

        let similarity = match &self.reference {
            Some(records) => Some(Arc::new(SimilarityIndex::build(records, &scaler)?)),
            None => None,
        };

        info!(
            "Predictor for {} ready ({} columns, model {})",
            variant,
            contract.len(),
            if model.is_available() { "available" } else { "unavailable" }
        );

        Ok(Predictor {
            variant,
            contract: Arc::new(contract),
            scaler: Arc::new(scaler),
            model,
            target: variant.info().target,
            target_encoder: self.encoders.target_encoder.map(Arc::new),
            similarity,
            neighbors: self.neighbors,
        })
    }

    fn validate_scaler(contract: &FeatureContract, scaler: &StandardScaler) -> Result<(), PredictorError> {
        if scaler.feature_names != contract.scaler_order() {
            return Err(PredictorError::BuildError(format!(
                "Scaler was fit on {:?} but the contract scales {:?}",
                scaler.feature_names,
                contract.scaler_order()
            )));
        }
        Ok(())
    }

    fn validate_model(
        variant: ModelVariant,
        contract: &FeatureContract,
        estimator: &Estimator,
        encoders: &EncoderSet,
    ) -> Result<(), PredictorError> {
        estimator.validate()?;

        if estimator.n_features() != contract.len() {
            return Err(PredictorError::BuildError(format!(
                "Model expects {} features but the contract has {} columns",
                estimator.n_features(),
                contract.len()
            )));
        }

        let expected_task = variant.info().task;
        if estimator.task() != expected_task {
            return Err(PredictorError::BuildError(format!(
                "{} needs a {:?} model, got {:?}",
                variant,
                expected_task,
                estimator.task()
            )));
        }

        if let (Some(n_classes), Some(target)) = (estimator.n_classes(), &encoders.target_encoder) {
            if n_classes != target.len() {
                return Err(PredictorError::BuildError(format!(
                    "Model has {} classes but the target encoder has {}",
                    n_classes,
                    target.len()
                )));
            }
        }
        Ok(())
    }

    fn validate_encoders(contract: &FeatureContract, encoders: &EncoderSet) -> Result<(), PredictorError> {
        let group = match contract.one_hot() {
            Some(group) => group,
            None => return Ok(()),
        };
        if let Some(encoder) = encoders.label_encoders.get(&group.field) {
            let mut vocabulary = group.vocabulary.clone();
            vocabulary.sort();
            if encoder.classes != vocabulary {
                return Err(PredictorError::BuildError(format!(
                    "Persisted {} vocabulary does not match the contract's {} entries",
                    group.field,
                    group.vocabulary.len()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::encoder::LabelEncoder;
    use crate::predictor::estimator::{LinearRegression, LogisticRegression};
    use crate::variants::BRAND_VOCABULARY;

    fn regression_scaler() -> StandardScaler {
        StandardScaler::new(
            vec!["year".into(), "max_power".into(), "mileage".into()],
            vec![2014.0, 91.0, 19.0],
            vec![4.0, 35.0, 4.0],
        )
        .unwrap()
    }

    fn linear() -> Estimator {
        Estimator::Linear(LinearRegression { coef: vec![0.3, 0.4, -0.05], intercept: 13.0 })
    }

    #[test]
    fn test_build_requires_variant() {
        let result = PredictorBuilder::new().with_model(linear()).build();
        assert!(matches!(result, Err(PredictorError::BuildError(_))));
    }

    #[test]
    fn test_build_requires_scaler() {
        let result = PredictorBuilder::new()
            .with_variant(ModelVariant::A1)
            .with_model(linear())
            .build();
        assert!(matches!(result, Err(PredictorError::BuildError(msg)) if msg.contains("scaler")));
    }

    #[test]
    fn test_scaler_order_mismatch_rejected() {
        let scaler = StandardScaler::new(
            vec!["max_power".into(), "year".into(), "mileage".into()],
            vec![91.0, 2014.0, 19.0],
            vec![35.0, 4.0, 4.0],
        )
        .unwrap();
        let result = PredictorBuilder::new()
            .with_variant(ModelVariant::A1)
            .with_scaler(scaler)
            .unwrap()
            .with_model(linear())
            .build();
        assert!(matches!(result, Err(PredictorError::BuildError(msg)) if msg.contains("Scaler was fit on")));
    }

    #[test]
    fn test_model_width_mismatch_rejected() {
        let result = PredictorBuilder::new()
            .with_variant(ModelVariant::A1)
            .with_scaler(regression_scaler())
            .unwrap()
            .with_model(Estimator::Linear(LinearRegression { coef: vec![1.0; 4], intercept: 0.0 }))
            .build();
        assert!(matches!(result, Err(PredictorError::BuildError(_))));
    }

    #[test]
    fn test_task_mismatch_rejected() {
        let result = PredictorBuilder::new()
            .with_variant(ModelVariant::A1)
            .with_scaler(regression_scaler())
            .unwrap()
            .with_model(Estimator::Logistic(LogisticRegression {
                coef: vec![vec![1.0, 1.0, 1.0]],
                intercept: vec![0.0],
            }))
            .build();
        assert!(matches!(result, Err(PredictorError::BuildError(msg)) if msg.contains("Regression")));
    }

    #[test]
    fn test_scaler_set_twice_rejected() {
        let result = PredictorBuilder::new()
            .with_variant(ModelVariant::A1)
            .with_scaler(regression_scaler())
            .unwrap()
            .with_scaler(regression_scaler());
        assert!(result.is_err());
    }

    #[test]
    fn test_unavailable_model_still_builds() {
        let predictor = PredictorBuilder::new()
            .with_variant(ModelVariant::A1)
            .with_scaler(regression_scaler())
            .unwrap()
            .with_unavailable_model("registry unreachable")
            .build()
            .unwrap();
        assert!(!predictor.is_available());
        assert_eq!(predictor.info().unavailable_reason.as_deref(), Some("registry unreachable"));
    }

    #[test]
    fn test_vocabulary_mismatch_rejected() {
        let scaler = StandardScaler::new(
            vec!["year".into(), "max_power".into(), "mileage".into(), "engine".into()],
            vec![2014.0, 91.0, 19.0, 1400.0],
            vec![4.0, 35.0, 4.0, 500.0],
        )
        .unwrap();
        let encoders = EncoderSet {
            label_encoders: [("brand".to_string(), LabelEncoder::fit(vec!["Maruti", "Tata"]))]
                .into_iter()
                .collect(),
            target_encoder: None,
        };
        let result = PredictorBuilder::new()
            .with_variant(ModelVariant::A3)
            .with_scaler(scaler.clone())
            .unwrap()
            .with_unavailable_model("offline")
            .with_encoders(encoders)
            .build();
        assert!(matches!(result, Err(PredictorError::BuildError(msg)) if msg.contains("vocabulary")));

        let encoders = EncoderSet {
            label_encoders: [("brand".to_string(), LabelEncoder::fit(BRAND_VOCABULARY))]
                .into_iter()
                .collect(),
            target_encoder: None,
        };
        assert!(PredictorBuilder::new()
            .with_variant(ModelVariant::A3)
            .with_scaler(scaler)
            .unwrap()
            .with_unavailable_model("offline")
            .with_encoders(encoders)
            .build()
            .is_ok());
    }

    #[test]
    fn test_registry_variant_has_no_artifacts_dir() {
        let result = PredictorBuilder::new()
            .with_variant(ModelVariant::A3)
            .with_artifacts_dir("models");
        assert!(matches!(result, Err(PredictorError::BuildError(_))));
    }
}
