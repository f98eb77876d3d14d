//! Configuration management
//!
//! TOML-backed configuration with environment overrides and structured
//! validation. Every registry/service/watcher instance gets its settings
//! injected from here; nothing reads ambient global state.

use crate::error::{DiagSearchError, Result, ValidationError};
use crate::registry::RegistrySettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Local and durable storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Local working directory: serving and staging copies live here.
    pub data_dir: PathBuf,
    /// Root of the durable model store (per tenant: `{tenant}/models/{version}`).
    pub store_root: PathBuf,
    /// Minimum detector corpus size accepted at package load.
    pub min_corpus_docs: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("diagsearch");
        Self {
            data_dir: base.join("data"),
            store_root: base.join("store"),
            min_corpus_docs: 1,
        }
    }
}

/// Query validation and execution limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub min_query_len: usize,
    pub max_query_len: usize,
    pub timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            min_query_len: 2,
            max_query_len: 250,
            timeout_ms: 10_000,
        }
    }
}

/// Background model sync configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    /// Tenants the watcher keeps in sync.
    pub tenants: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            tenants: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            query: QueryConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DiagSearchError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| DiagSearchError::Io {
            source: e,
            context: format!("Failed to read config file: {}", path.display()),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Load from a file if given, else defaults plus env overrides.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Config::default();
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = std::env::var("DIAGSEARCH_DATA_DIR") {
            self.storage.data_dir = expand_tilde(Path::new(&dir));
        }
        if let Ok(root) = std::env::var("DIAGSEARCH_STORE_ROOT") {
            self.storage.store_root = expand_tilde(Path::new(&root));
        }
        if let Ok(interval) = std::env::var("DIAGSEARCH_SYNC_INTERVAL") {
            if let Ok(secs) = interval.parse() {
                self.sync.interval_secs = secs;
            }
        }
    }

    /// Validate the configuration, collecting every violation.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();

        if self.storage.min_corpus_docs == 0 {
            errors.push(ValidationError::new(
                "storage.min_corpus_docs",
                "must be at least 1",
            ));
        }
        if self.query.min_query_len == 0 {
            errors.push(ValidationError::new(
                "query.min_query_len",
                "must be at least 1",
            ));
        }
        if self.query.max_query_len <= self.query.min_query_len {
            errors.push(ValidationError::new(
                "query.max_query_len",
                "must be greater than query.min_query_len",
            ));
        }
        if self.query.timeout_ms == 0 {
            errors.push(ValidationError::new("query.timeout_ms", "must be non-zero"));
        }
        if self.sync.interval_secs == 0 {
            errors.push(ValidationError::new(
                "sync.interval_secs",
                "must be non-zero",
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiagSearchError::ConfigValidation { errors })
        }
    }

    /// Registry settings derived from the storage section.
    pub fn registry_settings(&self) -> RegistrySettings {
        let data_dir = expand_tilde(&self.storage.data_dir);
        RegistrySettings {
            serving_root: data_dir.join("serving"),
            staging_root: data_dir.join("staging"),
            min_corpus_docs: self.storage.min_corpus_docs,
        }
    }

    pub fn store_root(&self) -> PathBuf {
        expand_tilde(&self.storage.store_root)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync.interval_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query.timeout_ms)
    }
}

/// Expand tilde in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            if let Ok(rest) = path.strip_prefix("~") {
                return home.join(rest);
            }
        }
    }
    path.to_path_buf()
}
