use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::encoder::LabelEncoder;
use super::error::PredictorError;
use super::estimator::Estimator;
use super::scaler::StandardScaler;

/// Reads and decodes a JSON artifact, naming the file in any error.
pub fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, PredictorError> {
    let bytes = fs::read(path).map_err(|e| {
        PredictorError::ArtifactError(format!("Failed to read {}: {}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        PredictorError::ArtifactError(format!("Failed to decode {}: {}", path.display(), e))
    })
}

/// Categorical and target encoders persisted next to a model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EncoderSet {
    #[serde(default)]
    pub label_encoders: BTreeMap<String, LabelEncoder>,
    #[serde(default)]
    pub target_encoder: Option<LabelEncoder>,
}

impl EncoderSet {
    pub fn validate(&self) -> Result<(), PredictorError> {
        for encoder in self.label_encoders.values() {
            encoder.validate()?;
        }
        if let Some(encoder) = &self.target_encoder {
            encoder.validate()?;
        }
        Ok(())
    }
}

/// Everything needed to reproduce a trained predictor: estimator, fitted scaler
/// and any encoders. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactBundle {
    pub estimator: Estimator,
    pub scaler: StandardScaler,
    #[serde(flatten)]
    pub encoders: EncoderSet,
}

impl ArtifactBundle {
    pub fn new(estimator: Estimator, scaler: StandardScaler) -> Self {
        Self {
            estimator,
            scaler,
            encoders: EncoderSet::default(),
        }
    }

    pub fn with_label_encoder(mut self, field: impl Into<String>, encoder: LabelEncoder) -> Self {
        self.encoders.label_encoders.insert(field.into(), encoder);
        self
    }

    pub fn with_target_encoder(mut self, encoder: LabelEncoder) -> Self {
        self.encoders.target_encoder = Some(encoder);
        self
    }

    pub fn validate(&self) -> Result<(), PredictorError> {
        self.estimator.validate()?;
        self.scaler.validate()?;
        self.encoders.validate()
    }

    /// Loads a bundle stored as one JSON document.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PredictorError> {
        let path = path.as_ref();
        let bundle: Self = read_artifact(path)?;
        bundle.validate()?;
        info!("Loaded artifact bundle from {}", path.display());
        Ok(bundle)
    }

    /// Loads a bundle split across a model file and a scaler file.
    pub fn from_files(model_path: impl AsRef<Path>, scaler_path: impl AsRef<Path>) -> Result<Self, PredictorError> {
        let estimator: Estimator = read_artifact(model_path.as_ref())?;
        let scaler: StandardScaler = read_artifact(scaler_path.as_ref())?;
        let bundle = Self::new(estimator, scaler);
        bundle.validate()?;
        info!(
            "Loaded model {} and scaler {}",
            model_path.as_ref().display(),
            scaler_path.as_ref().display()
        );
        Ok(bundle)
    }

    /// Saves the bundle as one JSON document, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PredictorError> {
        let path = path.as_ref();
        self.validate()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                PredictorError::ArtifactError(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| PredictorError::ArtifactError(format!("Failed to encode bundle: {}", e)))?;
        fs::write(path, json).map_err(|e| {
            PredictorError::ArtifactError(format!("Failed to write {}: {}", path.display(), e))
        })?;
        info!("Saved artifact bundle to {}", path.display());
        Ok(())
    }
}

/// The estimator a predictor serves with, or the reason there is none.
#[derive(Debug, Clone)]
pub enum ModelSlot {
    Real(Arc<Estimator>),
    Unavailable { reason: String },
}

impl ModelSlot {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Real(_))
    }

    pub fn estimator(&self) -> Result<&Estimator, PredictorError> {
        match self {
            Self::Real(estimator) => Ok(estimator),
            Self::Unavailable { reason } => Err(PredictorError::ModelUnavailable(reason.clone())),
        }
    }
}

impl From<Estimator> for ModelSlot {
    fn from(estimator: Estimator) -> Self {
        Self::Real(Arc::new(estimator))
    }
}
