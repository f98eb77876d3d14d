//! Per-tenant model registry and lifecycle state machine
//!
//! Owns the map from tenant id to the currently active search model and
//! the load / refresh / evict protocol. The correctness property all of
//! this serves: a reader must never observe a torn or half-deleted model.
//! A refresh fully loads and verifies the candidate in a staging
//! directory, then swaps directories, then swaps the in-memory pointer;
//! any failure leaves the previously active model serving. Old packages
//! are released only when the last in-flight reader drops its reference.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{DiagSearchError, Result};
use crate::model::{ModelError, ModelPackage, SearchModel};
use crate::store::{latest_version, ModelStore};

/// Registry tuning knobs, injected rather than ambient.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    /// Root for live per-tenant package directories.
    pub serving_root: PathBuf,
    /// Root for refresh staging directories (same filesystem as serving,
    /// so the final move is a rename).
    pub staging_root: PathBuf,
    /// Minimum detector corpus size accepted at load.
    pub min_corpus_docs: usize,
}

/// One loaded tenant: the swappable model pointer plus load metadata.
struct TenantEntry {
    current: RwLock<Arc<SearchModel>>,
    loaded_at: RwLock<DateTime<Utc>>,
}

/// Point-in-time view of a tenant's lifecycle state.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TenantStatus {
    pub tenant: String,
    #[serde(rename = "trainingId")]
    pub training_id: String,
    #[serde(rename = "loadedAt")]
    pub loaded_at: DateTime<Utc>,
    #[serde(rename = "detectorCorpusSize")]
    pub detector_corpus_size: usize,
}

/// Process-wide registry of active per-tenant search models.
pub struct ModelRegistry {
    store: Arc<dyn ModelStore>,
    settings: RegistrySettings,
    entries: RwLock<HashMap<String, Arc<TenantEntry>>>,
    /// Per-tenant lifecycle locks: load/refresh/evict for one tenant are
    /// serialized against each other without blocking other tenants.
    lifecycle: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ModelStore>, settings: RegistrySettings) -> Self {
        Self {
            store,
            settings,
            entries: RwLock::new(HashMap::new()),
            lifecycle: Mutex::new(HashMap::new()),
        }
    }

    /// The live package directory for a tenant.
    pub fn serving_dir(&self, tenant: &str) -> PathBuf {
        self.settings.serving_root.join(tenant)
    }

    fn staging_dir(&self, tenant: &str) -> PathBuf {
        self.settings.staging_root.join(tenant)
    }

    fn tenant_lock(&self, tenant: &str) -> Arc<Mutex<()>> {
        let mut locks = self.lifecycle.lock().unwrap();
        Arc::clone(
            locks
                .entry(tenant.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// The currently active model for a tenant, if loaded.
    ///
    /// The returned reference stays valid for the caller's whole query
    /// even if a refresh swaps the tenant meanwhile.
    pub fn get(&self, tenant: &str) -> Option<Arc<SearchModel>> {
        let entries = self.entries.read().unwrap();
        entries
            .get(tenant)
            .map(|entry| Arc::clone(&entry.current.read().unwrap()))
    }

    /// Lifecycle metadata for every loaded tenant.
    pub fn statuses(&self) -> Vec<TenantStatus> {
        let entries = self.entries.read().unwrap();
        let mut statuses: Vec<TenantStatus> = entries
            .iter()
            .map(|(tenant, entry)| {
                let model = entry.current.read().unwrap();
                TenantStatus {
                    tenant: tenant.clone(),
                    training_id: model.training_id().to_string(),
                    loaded_at: *entry.loaded_at.read().unwrap(),
                    detector_corpus_size: model.package().detector_corpus_size(),
                }
            })
            .collect();
        statuses.sort_by(|a, b| a.tenant.cmp(&b.tenant));
        statuses
    }

    /// Ensure a tenant has an active model, loading it if absent.
    ///
    /// Idempotent: a loaded tenant is untouched. When the serving copy is
    /// missing on disk it is fetched from the durable store first; a
    /// verification failure triggers one fetch-and-retry before the error
    /// surfaces.
    pub fn ensure_loaded(&self, tenant: &str) -> Result<()> {
        if self.entries.read().unwrap().contains_key(tenant) {
            return Ok(());
        }
        let lock = self.tenant_lock(tenant);
        let _guard = lock.lock().unwrap();
        if self.entries.read().unwrap().contains_key(tenant) {
            return Ok(());
        }

        let serving = self.serving_dir(tenant);
        if !serving.is_dir() {
            tracing::info!(tenant, "No local model copy, fetching from store");
            self.fetch_latest(tenant, &serving)?;
        }

        let model = match self.load_model(&serving) {
            Ok(model) => model,
            Err(DiagSearchError::Model(ModelError::FileMissing { file })) => {
                tracing::warn!(tenant, %file, "Model verification failed, re-fetching once");
                remove_dir_logged(&serving);
                self.fetch_latest(tenant, &serving)?;
                self.load_model(&serving)?
            }
            Err(e) => return Err(e),
        };

        self.install(tenant, model);
        tracing::info!(tenant, "Model loaded");
        Ok(())
    }

    /// Replace a tenant's model with the latest durable version.
    ///
    /// The candidate is fetched into staging and fully verified there;
    /// only then is the serving directory replaced and the pointer
    /// swapped. On any failure the staging copy is discarded and the
    /// previously active model keeps serving.
    pub fn refresh(&self, tenant: &str) -> Result<()> {
        let lock = self.tenant_lock(tenant);
        let _guard = lock.lock().unwrap();

        let staging = self.staging_dir(tenant);
        remove_dir_logged(&staging);

        let outcome = self.refresh_inner(tenant, &staging);
        if outcome.is_err() {
            remove_dir_logged(&staging);
        }
        outcome
    }

    fn refresh_inner(&self, tenant: &str, staging: &Path) -> Result<()> {
        self.fetch_latest(tenant, staging)?;

        // Verify in place; the served copy is not touched on failure.
        let candidate = self.load_model(staging)?;
        let training_id = candidate.training_id().to_string();
        drop(candidate);

        let serving = self.serving_dir(tenant);
        if serving.exists() {
            fs::remove_dir_all(&serving).map_err(|e| DiagSearchError::Io {
                source: e,
                context: format!("Failed to remove old serving copy {}", serving.display()),
            })?;
        }
        if let Some(parent) = serving.parent() {
            fs::create_dir_all(parent).map_err(|e| DiagSearchError::Io {
                source: e,
                context: format!("Failed to create serving root {}", parent.display()),
            })?;
        }
        fs::rename(staging, &serving).map_err(|e| DiagSearchError::Io {
            source: e,
            context: format!(
                "Failed to move staged model {} to {}",
                staging.display(),
                serving.display()
            ),
        })?;

        // Reload from the final location so lazy attach reads live paths.
        let model = self.load_model(&serving)?;
        self.install(tenant, model);
        tracing::info!(tenant, %training_id, "Model refreshed");
        Ok(())
    }

    /// Drop a tenant's model. In-flight queries finish on their captured
    /// reference; the package memory is freed when the last one drops.
    pub fn evict(&self, tenant: &str) {
        let lock = self.tenant_lock(tenant);
        let _guard = lock.lock().unwrap();
        if self.entries.write().unwrap().remove(tenant).is_some() {
            tracing::info!(tenant, "Model evicted");
        }
    }

    /// Training marker of the local serving copy, if any.
    pub fn local_training_marker(&self, tenant: &str) -> String {
        fs::read_to_string(
            self.serving_dir(tenant)
                .join(crate::model::PackageFile::TrainingId.file_name()),
        )
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
    }

    fn fetch_latest(&self, tenant: &str, dest: &Path) -> Result<()> {
        let version = latest_version(self.store.as_ref(), tenant)?;
        self.store.fetch_version(tenant, version, dest)?;
        Ok(())
    }

    fn load_model(&self, dir: &Path) -> Result<SearchModel> {
        let package = ModelPackage::load(dir, self.settings.min_corpus_docs)?;
        Ok(SearchModel::new(package))
    }

    fn install(&self, tenant: &str, model: SearchModel) {
        let model = Arc::new(model);
        let mut entries = self.entries.write().unwrap();
        match entries.get(tenant) {
            Some(entry) => {
                *entry.current.write().unwrap() = model;
                *entry.loaded_at.write().unwrap() = Utc::now();
            }
            None => {
                entries.insert(
                    tenant.to_string(),
                    Arc::new(TenantEntry {
                        current: RwLock::new(model),
                        loaded_at: RwLock::new(Utc::now()),
                    }),
                );
            }
        }
    }
}

/// Best-effort directory removal; failures are logged, never fatal.
fn remove_dir_logged(dir: &Path) {
    if dir.exists() {
        if let Err(e) = fs::remove_dir_all(dir) {
            tracing::warn!("Failed to clean up {}: {e}", dir.display());
        }
    }
}
