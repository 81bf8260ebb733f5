//! Page handlers: the three prediction pages share one [`App`] built at startup.
//!
//! A handler takes the raw form strings exactly as a browser submits them and
//! always produces a displayable [`PageResponse`]; request failures never escape as
//! errors.

use std::sync::Arc;

use log::{error, info, warn};
use serde::Serialize;

use crate::config::AppConfig;
use crate::dataset::{load_reference_dataset, CarRecord};
use crate::predictor::{format_thousands, Prediction, Predictor, PredictorError, RawFeatures, SimilarCar};
use crate::registry::RegistryClient;
use crate::variants::ModelVariant;

pub const PROMPT: &str = "Enter details and click Predict.";
pub const MISSING_FIELDS_MESSAGE: &str = "All fields are required. Please fill in every input.";
pub const INVALID_INPUT_MESSAGE: &str = "Invalid input. Please ensure all numerical fields are valid numbers.";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormError {
    #[error("Field '{0}' is required")]
    Missing(String),
    #[error("Field '{field}' is not a valid number: {value:?}")]
    Invalid { field: String, value: String },
}

impl FormError {
    /// The message shown on the page
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Missing(_) => MISSING_FIELDS_MESSAGE,
            Self::Invalid { .. } => INVALID_INPUT_MESSAGE,
        }
    }
}

/// Raw form values as submitted. Blank strings count as missing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormInput {
    pub year: Option<String>,
    pub max_power: Option<String>,
    pub mileage: Option<String>,
    pub engine: Option<String>,
    pub brand: Option<String>,
}

impl FormInput {
    pub fn field(&self, name: &str) -> Option<&str> {
        let value = match name {
            "year" => &self.year,
            "max_power" => &self.max_power,
            "mileage" => &self.mileage,
            "engine" => &self.engine,
            "brand" => &self.brand,
            _ => return None,
        };
        value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }

    /// Converts the form into model features for `variant`.
    ///
    /// Every field the variant needs is checked for presence before any is parsed.
    /// `year` is truncated to a whole number.
    pub fn to_features(&self, variant: ModelVariant) -> Result<RawFeatures, FormError> {
        let contract = variant.contract();
        let category_field = contract.one_hot().map(|group| group.field.as_str());

        let required = contract.numeric_columns().iter().map(String::as_str).chain(category_field);
        for name in required {
            if self.field(name).is_none() {
                return Err(FormError::Missing(name.to_string()));
            }
        }

        let mut features = RawFeatures::new();
        for name in contract.numeric_columns() {
            let raw = self.field(name).unwrap_or_default();
            let mut value = raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| FormError::Invalid { field: name.clone(), value: raw.to_string() })?;
            if name == "year" {
                value = value.trunc();
            }
            features = features.with_numeric(name.clone(), value);
        }
        if let Some(field) = category_field {
            features = features.with_category(field, self.field(field).unwrap_or_default());
        }
        Ok(features)
    }
}

/// What a page displays after a click.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResponse {
    pub message: String,
    pub similar: Vec<SimilarCar>,
    pub warnings: Vec<String>,
}

impl PageResponse {
    fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            similar: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// Loaded predictors for every page, passed by reference into each handler.
#[derive(Debug, Clone)]
pub struct App {
    a1: Predictor,
    a2: Predictor,
    a3: Predictor,
}

impl App {
    pub fn new(a1: Predictor, a2: Predictor, a3: Predictor) -> Self {
        Self { a1, a2, a3 }
    }

    /// Loads all artifacts and the reference dataset.
    ///
    /// # Errors
    /// Fails on any local artifact problem or an unreadable dataset. A registry
    /// failure does not fail startup; the classification page is served with an
    /// unavailable model instead.
    pub async fn load<R: RegistryClient>(config: &AppConfig, registry: &R) -> Result<Self, PredictorError> {
        let reference = load_reference(config)?;
        let dir = &config.models_dir;
        info!("Loading model artifacts from {:?}", dir);

        let regression = |variant: ModelVariant| -> Result<Predictor, PredictorError> {
            let mut builder = Predictor::builder()
                .with_variant(variant)
                .with_neighbors(config.neighbors)
                .with_artifacts_dir(dir)?;
            if let Some(records) = &reference {
                builder = builder.with_reference_dataset(Arc::clone(records));
            }
            builder.build().map_err(|e| {
                error!("Failed to build {} predictor: {}", variant, e);
                e
            })
        };
        let a1 = regression(ModelVariant::A1)?;
        let a2 = regression(ModelVariant::A2)?;

        let info = ModelVariant::A3.info();
        let mut builder = Predictor::builder()
            .with_variant(ModelVariant::A3)
            .with_neighbors(config.neighbors)
            .with_scaler_file(dir.join(info.scaler_file))?;
        if let Some(file) = info.encoder_file {
            let path = dir.join(file);
            if path.exists() {
                builder = builder.with_encoder_file(path)?;
            } else {
                warn!("Encoder file {:?} not found; price classes will be shown as indices", path);
            }
        }
        if let Some(records) = &reference {
            builder = builder.with_reference_dataset(Arc::clone(records));
        }

        let name = &config.registry.model_name;
        let version = config.registry.model_version;
        builder = match registry.load(name, version).await {
            Ok(estimator) => {
                info!("Loaded {} v{} from registry", name, version);
                builder.with_model(estimator)
            }
            Err(e) => {
                warn!("Registry load of {} v{} failed: {}", name, version, e);
                builder.with_unavailable_model(e.to_string())
            }
        };
        let a3 = builder.build()?;

        info!("All predictors ready");
        Ok(Self { a1, a2, a3 })
    }

    pub fn predictor(&self, variant: ModelVariant) -> &Predictor {
        match variant {
            ModelVariant::A1 => &self.a1,
            ModelVariant::A2 => &self.a2,
            ModelVariant::A3 => &self.a3,
        }
    }

    /// Handles one click on a prediction page.
    ///
    /// `n_clicks == 0` means the page was just opened: the prompt is returned and
    /// nothing is parsed or computed.
    pub fn handle(&self, variant: ModelVariant, n_clicks: u64, form: &FormInput) -> PageResponse {
        if n_clicks == 0 {
            return PageResponse::message(PROMPT);
        }

        let features = match form.to_features(variant) {
            Ok(features) => features,
            Err(e) => {
                info!("Rejected {} request: {}", variant, e);
                return PageResponse::message(e.user_message());
            }
        };

        match self.predictor(variant).predict(&features) {
            Ok(result) => {
                let message = match &result.prediction {
                    Prediction::Price(price) => format!("Estimated Selling Price: ₹{}", format_thousands(*price)),
                    Prediction::Class { label, .. } => format!("Predicted Selling Price Class: {}", label),
                };
                PageResponse {
                    message,
                    similar: result.similar,
                    warnings: result.warnings,
                }
            }
            Err(PredictorError::ModelUnavailable(reason)) => {
                PageResponse::message(format!("Error: Model unavailable ({}). Cannot predict.", reason))
            }
            Err(e) => {
                error!("{} prediction failed: {}", variant, e);
                PageResponse::message(format!("Prediction Error: {}", e.detail()))
            }
        }
    }
}

fn load_reference(config: &AppConfig) -> Result<Option<Arc<Vec<CarRecord>>>, PredictorError> {
    match &config.data_path {
        Some(path) if path.exists() => Ok(Some(Arc::new(load_reference_dataset(path)?))),
        Some(path) => {
            warn!("Reference dataset {:?} not found; similar cars will not be shown", path);
            Ok(None)
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(year: &str, max_power: &str, mileage: &str) -> FormInput {
        FormInput {
            year: Some(year.into()),
            max_power: Some(max_power.into()),
            mileage: Some(mileage.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_regression_features() {
        let features = form("2019", "94.5", " 14.6 ").to_features(ModelVariant::A1).unwrap();
        assert_eq!(features.numeric("year"), Some(2019.0));
        assert_eq!(features.numeric("max_power"), Some(94.5));
        assert_eq!(features.numeric("mileage"), Some(14.6));
        assert_eq!(features.category("brand"), None);
    }

    #[test]
    fn test_year_is_truncated() {
        let features = form("2019.7", "94.5", "14.6").to_features(ModelVariant::A2).unwrap();
        assert_eq!(features.numeric("year"), Some(2019.0));
    }

    #[test]
    fn test_missing_fields() {
        let err = form("2019", "", "14.6").to_features(ModelVariant::A1).unwrap_err();
        assert_eq!(err, FormError::Missing("max_power".into()));
        assert_eq!(err.user_message(), MISSING_FIELDS_MESSAGE);

        // engine and brand are only required by the classifier
        let input = form("2019", "94.5", "14.6");
        assert!(input.to_features(ModelVariant::A1).is_ok());
        assert!(matches!(input.to_features(ModelVariant::A3), Err(FormError::Missing(_))));
    }

    #[test]
    fn test_missing_reported_before_invalid() {
        let err = form("abc", "94.5", "").to_features(ModelVariant::A1).unwrap_err();
        assert_eq!(err, FormError::Missing("mileage".into()));
    }

    #[test]
    fn test_invalid_number() {
        for bad in ["abc", "NaN", "inf", "1,200"] {
            let err = form("2019", bad, "14.6").to_features(ModelVariant::A1).unwrap_err();
            assert_eq!(err.user_message(), INVALID_INPUT_MESSAGE, "input {:?}", bad);
        }
    }

    #[test]
    fn test_classification_features() {
        let input = FormInput {
            engine: Some("1197".into()),
            brand: Some("Maruti".into()),
            ..form("2019", "94.5", "14.6")
        };
        let features = input.to_features(ModelVariant::A3).unwrap();
        assert_eq!(features.numeric("engine"), Some(1197.0));
        assert_eq!(features.category("brand"), Some("Maruti"));
    }
}
