use std::env;
use std::fs;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::predictor::Estimator;

const MODEL_FILE: &str = "model.json";

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Model registry is not configured")]
    NotConfigured,
    #[error("Model {name} version {version} not found in registry")]
    NotFound { name: String, version: u32 },
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Decode error: {0}")]
    DecodeError(#[from] serde_json::Error),
    #[error("Hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
    #[error("Invalid model: {0}")]
    InvalidModel(String),
}

/// A source of trained estimators addressed by name and version.
///
/// Implementations must be treated as unreliable: callers fall back to an
/// unavailable model when `load` fails.
pub trait RegistryClient {
    fn load(&self, name: &str, version: u32) -> impl Future<Output = Result<Estimator, RegistryError>> + Send;
}

fn parse_estimator(bytes: &[u8]) -> Result<Estimator, RegistryError> {
    let estimator: Estimator = serde_json::from_slice(bytes)?;
    estimator
        .validate()
        .map_err(|e| RegistryError::InvalidModel(e.to_string()))?;
    Ok(estimator)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Used when no registry is configured; every load fails with `NotConfigured`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledRegistry;

impl RegistryClient for DisabledRegistry {
    async fn load(&self, _name: &str, _version: u32) -> Result<Estimator, RegistryError> {
        Err(RegistryError::NotConfigured)
    }
}

/// Serves models from a local directory laid out as `<root>/<name>/<version>/model.json`.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    root: PathBuf,
}

impl FileRegistry {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn get_model_path(&self, name: &str, version: u32) -> PathBuf {
        self.root.join(name).join(version.to_string()).join(MODEL_FILE)
    }
}

impl RegistryClient for FileRegistry {
    async fn load(&self, name: &str, version: u32) -> Result<Estimator, RegistryError> {
        let path = self.get_model_path(name, version);
        log::info!("Loading {} v{} from {:?}", name, version, path);
        if !path.exists() {
            return Err(RegistryError::NotFound { name: name.to_string(), version });
        }
        let bytes = tokio::fs::read(&path).await?;
        parse_estimator(&bytes)
    }
}

/// Fetches models over HTTP and keeps a local cache so later starts work offline.
#[derive(Clone)]
pub struct HttpRegistry {
    base_url: String,
    cache_dir: PathBuf,
    credentials: Option<(String, String)>,
    expected_sha256: Option<String>,
    client: reqwest::Client,
    download_lock: Arc<Mutex<()>>,
}

impl HttpRegistry {
    pub fn new<P: AsRef<Path>>(base_url: impl Into<String>, cache_dir: P) -> io::Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            cache_dir,
            credentials: None,
            expected_sha256: None,
            client: reqwest::Client::new(),
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Sends HTTP basic credentials with every request
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Pins the SHA-256 digest the model file must have
    pub fn with_expected_sha256(mut self, hash: impl Into<String>) -> Self {
        self.expected_sha256 = Some(hash.into().to_ascii_lowercase());
        self
    }

    /// Returns the default cache directory path
    pub fn get_default_cache_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("CARPRICE_CACHE") {
            return PathBuf::from(path).join("registry");
        }

        // 2. Use platform-specific cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("carprice").join("registry");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("carprice").join("registry");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("carprice").join("registry")
    }

    pub fn model_url(&self, name: &str, version: u32) -> String {
        format!("{}/models/{}/{}/{}", self.base_url, name, version, MODEL_FILE)
    }

    pub fn get_cache_path(&self, name: &str, version: u32) -> PathBuf {
        self.cache_dir.join(name).join(version.to_string()).join(MODEL_FILE)
    }

    pub fn is_cached(&self, name: &str, version: u32) -> bool {
        self.get_cache_path(name, version).exists()
    }

    pub fn remove_cached(&self, name: &str, version: u32) -> Result<(), RegistryError> {
        let path = self.get_cache_path(name, version);
        if path.exists() {
            log::info!("Removing cached model at {:?}", path);
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    fn verify_bytes(&self, bytes: &[u8]) -> Result<(), RegistryError> {
        if let Some(expected) = &self.expected_sha256 {
            let actual = sha256_hex(bytes);
            log::debug!("Calculated hash: {}", actual);
            if &actual != expected {
                return Err(RegistryError::HashMismatch {
                    expected: expected.clone(),
                    actual,
                });
            }
        }
        Ok(())
    }

    async fn download(&self, name: &str, version: u32) -> Result<Vec<u8>, RegistryError> {
        let url = self.model_url(name, version);
        log::info!("Downloading model {} v{} from {}", name, version, url);

        let mut request = self.client.get(&url);
        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, Some(password));
        }
        let response = request.send().await?;
        log::info!("Download response status: {}", response.status());
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(RegistryError::NotFound { name: name.to_string(), version });
        }
        let bytes = response.error_for_status()?.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());
        Ok(bytes.to_vec())
    }
}

impl RegistryClient for HttpRegistry {
    async fn load(&self, name: &str, version: u32) -> Result<Estimator, RegistryError> {
        let _lock = self.download_lock.lock().await;
        let path = self.get_cache_path(name, version);

        if path.exists() {
            log::info!("Model file cached at {:?}, verifying...", path);
            let bytes = fs::read(&path)?;
            match self.verify_bytes(&bytes).and_then(|_| parse_estimator(&bytes)) {
                Ok(estimator) => {
                    log::info!("Using cached model {} v{}", name, version);
                    return Ok(estimator);
                }
                Err(e) => {
                    log::warn!("Cached model rejected ({}), redownloading", e);
                }
            }
        }

        let bytes = self.download(name, version).await?;
        self.verify_bytes(&bytes)?;
        let estimator = parse_estimator(&bytes)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &bytes)?;
        log::info!("Model {} v{} downloaded and cached", name, version);
        Ok(estimator)
    }
}

/// The registry chosen by configuration.
#[derive(Clone)]
pub enum ConfiguredRegistry {
    Http(HttpRegistry),
    File(FileRegistry),
    Disabled(DisabledRegistry),
}

impl RegistryClient for ConfiguredRegistry {
    async fn load(&self, name: &str, version: u32) -> Result<Estimator, RegistryError> {
        match self {
            Self::Http(registry) => registry.load(name, version).await,
            Self::File(registry) => registry.load(name, version).await,
            Self::Disabled(registry) => registry.load(name, version).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_JSON: &str = r#"{"kind":"logistic","coef":[[1.0,0.0],[0.0,1.0]],"intercept":[0.0,0.0]}"#;

    fn write_model(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_file_registry_load() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path());
        write_model(&registry.get_model_path("cppm-a3-model", 24), MODEL_JSON);

        let estimator = registry.load("cppm-a3-model", 24).await.unwrap();
        assert_eq!(estimator.n_classes(), Some(2));
    }

    #[tokio::test]
    async fn test_file_registry_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path());
        let result = registry.load("cppm-a3-model", 1).await;
        assert!(matches!(result, Err(RegistryError::NotFound { version: 1, .. })));
    }

    #[tokio::test]
    async fn test_invalid_model_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path());
        write_model(
            &registry.get_model_path("m", 1),
            r#"{"kind":"logistic","coef":[[1.0]],"intercept":[0.0,1.0]}"#,
        );
        assert!(matches!(registry.load("m", 1).await, Err(RegistryError::InvalidModel(_))));
    }

    #[tokio::test]
    async fn test_disabled_registry() {
        assert!(matches!(DisabledRegistry.load("m", 1).await, Err(RegistryError::NotConfigured)));
    }

    #[tokio::test]
    async fn test_http_registry_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        // Nothing listens here; only the cache can satisfy the load
        let registry = HttpRegistry::new("http://127.0.0.1:9/", dir.path())
            .unwrap()
            .with_expected_sha256(sha256_hex(MODEL_JSON.as_bytes()));
        write_model(&registry.get_cache_path("cppm-a3-model", 24), MODEL_JSON);

        assert!(registry.is_cached("cppm-a3-model", 24));
        let estimator = registry.load("cppm-a3-model", 24).await.unwrap();
        assert_eq!(estimator.n_features(), 2);
    }

    #[tokio::test]
    async fn test_http_registry_rejects_tampered_cache() {
        let dir = tempfile::tempdir().unwrap();
        let registry = HttpRegistry::new("http://127.0.0.1:9", dir.path())
            .unwrap()
            .with_expected_sha256("00".repeat(32));
        write_model(&registry.get_cache_path("m", 1), MODEL_JSON);

        // Cache fails verification and the download cannot connect
        assert!(registry.load("m", 1).await.is_err());
    }

    #[test]
    fn test_paths_and_removal() {
        let dir = tempfile::tempdir().unwrap();
        let registry = HttpRegistry::new("https://registry.example.com/", dir.path()).unwrap();
        assert_eq!(
            registry.model_url("cppm-a3-model", 24),
            "https://registry.example.com/models/cppm-a3-model/24/model.json"
        );
        let path = registry.get_cache_path("cppm-a3-model", 24);
        assert!(path.ends_with("cppm-a3-model/24/model.json"));

        write_model(&path, MODEL_JSON);
        registry.remove_cached("cppm-a3-model", 24).unwrap();
        assert!(!registry.is_cached("cppm-a3-model", 24));
        // removing twice is fine
        registry.remove_cached("cppm-a3-model", 24).unwrap();
    }
}
