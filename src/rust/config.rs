use std::env;
use std::io;
use std::path::PathBuf;

use crate::predictor::DEFAULT_NEIGHBORS;
use crate::registry::{ConfiguredRegistry, DisabledRegistry, FileRegistry, HttpRegistry};

pub const DEFAULT_MODELS_DIR: &str = "models";
pub const DEFAULT_DATA_PATH: &str = "data/Cars.csv";
pub const DEFAULT_MODEL_NAME: &str = "cppm-a3-model";
pub const DEFAULT_MODEL_VERSION: u32 = 1;

/// Where the classification model is fetched from.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// Base URL of the registry; `None` disables remote loading
    pub url: Option<String>,
    pub model_name: String,
    pub model_version: u32,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Expected SHA-256 of the model file, hex encoded
    pub sha256: Option<String>,
    pub cache_dir: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: None,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            model_version: DEFAULT_MODEL_VERSION,
            username: None,
            password: None,
            sha256: None,
            cache_dir: HttpRegistry::get_default_cache_dir(),
        }
    }
}

impl RegistryConfig {
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }

    /// Creates the client for this configuration. A `file://` URL serves models
    /// from a local directory; no URL disables the registry.
    pub fn client(&self) -> io::Result<ConfiguredRegistry> {
        let Some(url) = &self.url else {
            return Ok(ConfiguredRegistry::Disabled(DisabledRegistry));
        };
        if let Some(root) = url.strip_prefix("file://") {
            return Ok(ConfiguredRegistry::File(FileRegistry::new(root)));
        }

        let mut registry = HttpRegistry::new(url.as_str(), &self.cache_dir)?;
        if let Some((username, password)) = self.credentials() {
            registry = registry.with_credentials(username, password);
        }
        if let Some(hash) = &self.sha256 {
            registry = registry.with_expected_sha256(hash.as_str());
        }
        Ok(ConfiguredRegistry::Http(registry))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Directory holding the per-variant artifact files
    pub models_dir: PathBuf,
    /// Reference dataset; similar-car lookup is disabled when `None` or missing
    pub data_path: Option<PathBuf>,
    pub neighbors: usize,
    pub registry: RegistryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from(DEFAULT_MODELS_DIR),
            data_path: Some(PathBuf::from(DEFAULT_DATA_PATH)),
            neighbors: DEFAULT_NEIGHBORS,
            registry: RegistryConfig::default(),
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> T {
    match non_empty_var(key) {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            log::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
        None => default,
    }
}

impl AppConfig {
    /// Reads the configuration from `CARPRICE_*` environment variables,
    /// falling back to the defaults for anything unset.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let registry = RegistryConfig {
            url: non_empty_var("CARPRICE_REGISTRY_URL"),
            model_name: non_empty_var("CARPRICE_MODEL_NAME").unwrap_or(defaults.registry.model_name),
            model_version: parse_var("CARPRICE_MODEL_VERSION", defaults.registry.model_version),
            username: non_empty_var("CARPRICE_REGISTRY_USERNAME"),
            password: non_empty_var("CARPRICE_REGISTRY_PASSWORD"),
            sha256: non_empty_var("CARPRICE_MODEL_SHA256"),
            cache_dir: defaults.registry.cache_dir,
        };

        let config = Self {
            models_dir: non_empty_var("CARPRICE_MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            data_path: non_empty_var("CARPRICE_DATA").map(PathBuf::from).or(defaults.data_path),
            neighbors: parse_var("CARPRICE_NEIGHBORS", defaults.neighbors),
            registry,
        };
        log::debug!("Loaded configuration: {:?}", config.redacted());
        config
    }

    /// A copy safe to log
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.registry.password.is_some() {
            copy.registry.password = Some("***".to_string());
        }
        copy
    }
}
