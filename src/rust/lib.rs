//! Inference glue for car selling-price models.
//!
//! Three model variants are served: two regressors (A1, A2) that predict a price
//! from year, max power and mileage, and a classifier (A3) that also takes engine
//! size and brand and predicts a price class. Each variant has a fixed feature
//! contract; artifacts are checked against it when a [`Predictor`] is built.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use carprice::{ModelVariant, Predictor, RawFeatures};
//!
//! let predictor = Predictor::builder()
//!     .with_variant(ModelVariant::A2)
//!     .with_artifacts_dir("models")?
//!     .build()?;
//!
//! let result = predictor.predict(
//!     &RawFeatures::new()
//!         .with_numeric("year", 2019.0)
//!         .with_numeric("max_power", 94.5)
//!         .with_numeric("mileage", 14.6),
//! )?;
//! println!("{:?}", result.prediction);
//! # Ok(())
//! # }
//! ```
//!
//! # Serving pages
//!
//! [`App`] loads every variant once at startup. The classifier's estimator comes
//! from a [`RegistryClient`]; if that fails the page still loads and answers with an
//! explicit "model unavailable" message.
//!
//! ```rust,no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use carprice::{App, AppConfig, FormInput, ModelVariant};
//!
//! let config = AppConfig::from_env();
//! let registry = config.registry.client()?;
//! let app = App::load(&config, &registry).await?;
//!
//! let form = FormInput {
//!     year: Some("2019".into()),
//!     max_power: Some("94.5".into()),
//!     mileage: Some("14.6".into()),
//!     ..Default::default()
//! };
//! println!("{}", app.handle(ModelVariant::A1, 1, &form).message);
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod config;
pub mod dataset;
pub mod predictor;
pub mod registry;
pub mod variants;

pub use app::{App, FormError, FormInput, PageResponse};
pub use config::{AppConfig, RegistryConfig};
pub use dataset::{load_reference_dataset, CarRecord};
pub use predictor::{
    ArtifactBundle, Estimator, FeatureContract, Prediction, PredictionResult, Predictor, PredictorBuilder,
    PredictorError, PredictorInfo, RawFeatures, SimilarCar, StandardScaler,
};
pub use registry::{ConfiguredRegistry, DisabledRegistry, FileRegistry, HttpRegistry, RegistryClient, RegistryError};
pub use variants::{ModelVariant, VariantInfo, BRAND_VOCABULARY};

pub fn init_logger() {
    env_logger::init();
}
