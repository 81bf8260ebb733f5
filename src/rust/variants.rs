use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;

use crate::predictor::{FeatureContract, TaskKind};

/// The closed manufacturer vocabulary the classification model was trained on,
/// in training column order.
pub const BRAND_VOCABULARY: [&str; 32] = [
    "Ambassador", "Ashok", "Audi", "BMW", "Chevrolet", "Daewoo", "Datsun", "Fiat",
    "Force", "Ford", "Honda", "Hyundai", "Isuzu", "Jaguar", "Jeep", "Kia", "Land",
    "Lexus", "MG", "Mahindra", "Maruti", "Mercedes-Benz", "Mitsubishi", "Nissan",
    "Opel", "Peugeot", "Renault", "Skoda", "Tata", "Toyota", "Volkswagen", "Volvo",
];

lazy_static! {
    static ref REGRESSION_CONTRACT: FeatureContract =
        FeatureContract::new(&["year", "max_power", "mileage"]);

    static ref CLASSIFICATION_CONTRACT: FeatureContract =
        FeatureContract::new(&["year", "engine", "max_power", "mileage"])
            .with_scaler_order(&["year", "max_power", "mileage", "engine"])
            .with_one_hot("brand", "brand_", &BRAND_VOCABULARY);
}

/// How the raw regression output maps back to a price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetTransform {
    /// The model was trained on `ln(price)`
    Log,
    /// Output is used as is
    Identity,
}

impl TargetTransform {
    pub fn apply(&self, output: f64) -> f64 {
        match self {
            Self::Log => output.exp(),
            Self::Identity => output,
        }
    }
}

/// Represents the model variants the service can serve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Linear regression on year, max power and mileage
    A1,
    /// Degree-2 polynomial regression on the same three features
    A2,
    /// Multinomial logistic regression predicting a price class, with brand one-hot
    /// columns. Its estimator comes from the model registry.
    A3,
}

/// Static description of a variant and where its artifacts live.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantInfo {
    pub name: &'static str,
    pub title: &'static str,
    pub path: &'static str,
    pub task: TaskKind,
    pub target: TargetTransform,
    /// Local model file; `None` when the estimator is fetched from the registry
    pub model_file: Option<&'static str>,
    pub scaler_file: &'static str,
    pub encoder_file: Option<&'static str>,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 3] = [ModelVariant::A1, ModelVariant::A2, ModelVariant::A3];

    pub fn info(&self) -> VariantInfo {
        match self {
            Self::A1 => VariantInfo {
                name: "A1 Model",
                title: "Old Model Predictor",
                path: "/old-model",
                task: TaskKind::Regression,
                target: TargetTransform::Log,
                model_file: Some("cppm_a1_model.json"),
                scaler_file: "cppm_a1_scaler.json",
                encoder_file: None,
            },
            Self::A2 => VariantInfo {
                name: "A2 Model",
                title: "A2 Model Predictor",
                path: "/new-model",
                task: TaskKind::Regression,
                target: TargetTransform::Log,
                model_file: Some("cppm_a2_model.json"),
                scaler_file: "cppm_a2_scaler.json",
                encoder_file: None,
            },
            Self::A3 => VariantInfo {
                name: "A3 Model",
                title: "A3 Model Predictor (Classification)",
                path: "/a3-model",
                task: TaskKind::Classification,
                target: TargetTransform::Identity,
                model_file: None,
                scaler_file: "cppm_a3_scaler.json",
                encoder_file: Some("cppm_a3_encoders.json"),
            },
        }
    }

    /// The feature contract the variant's artifacts were trained with.
    pub fn contract(&self) -> &'static FeatureContract {
        match self {
            Self::A1 | Self::A2 => &REGRESSION_CONTRACT,
            Self::A3 => &CLASSIFICATION_CONTRACT,
        }
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A1 => write!(f, "a1"),
            Self::A2 => write!(f, "a2"),
            Self::A3 => write!(f, "a3"),
        }
    }
}

impl FromStr for ModelVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "a1" | "old" => Ok(Self::A1),
            "a2" | "new" => Ok(Self::A2),
            "a3" => Ok(Self::A3),
            other => Err(format!("Unknown model variant '{}', expected a1, a2 or a3", other)),
        }
    }
}
