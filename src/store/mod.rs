//! Durable model storage boundary
//!
//! The training pipeline uploads each trained package under
//! `{tenant}/models/{version}/`, versions strictly increasing. The serving
//! side only ever lists versions, reads the training marker, and fetches a
//! whole version into a local directory; `FsModelStore` implements that
//! over a local root, and a cloud blob client would plug in at the same
//! trait.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::PackageFile;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No model versions published for tenant {tenant}")]
    NoVersions { tenant: String },

    #[error("Store IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },
}

/// Read access to the durable, versioned model store.
pub trait ModelStore: Send + Sync {
    /// All published version identifiers for a tenant, unordered.
    fn list_versions(&self, tenant: &str) -> Result<Vec<u64>, StoreError>;

    /// Content of the training marker for one version.
    fn read_training_marker(&self, tenant: &str, version: u64) -> Result<String, StoreError>;

    /// Copy every file of one version into `dest` (created if absent).
    fn fetch_version(&self, tenant: &str, version: u64, dest: &Path) -> Result<(), StoreError>;
}

/// Convenience: the highest published version, if any.
pub fn latest_version(store: &dyn ModelStore, tenant: &str) -> Result<u64, StoreError> {
    store
        .list_versions(tenant)?
        .into_iter()
        .max()
        .ok_or_else(|| StoreError::NoVersions {
            tenant: tenant.to_string(),
        })
}

/// Filesystem-backed model store.
pub struct FsModelStore {
    root: PathBuf,
}

impl FsModelStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn versions_dir(&self, tenant: &str) -> PathBuf {
        self.root.join(tenant).join("models")
    }
}

impl ModelStore for FsModelStore {
    fn list_versions(&self, tenant: &str) -> Result<Vec<u64>, StoreError> {
        let dir = self.versions_dir(tenant);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut versions = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| StoreError::Io {
            source: e,
            context: format!("Failed to list versions under {}", dir.display()),
        })? {
            let entry = entry.map_err(|e| StoreError::Io {
                source: e,
                context: format!("Failed to read version entry under {}", dir.display()),
            })?;
            if entry.path().is_dir() {
                if let Some(version) = entry
                    .file_name()
                    .to_str()
                    .and_then(|name| name.parse::<u64>().ok())
                {
                    versions.push(version);
                }
            }
        }
        Ok(versions)
    }

    fn read_training_marker(&self, tenant: &str, version: u64) -> Result<String, StoreError> {
        let path = self
            .versions_dir(tenant)
            .join(version.to_string())
            .join(PackageFile::TrainingId.file_name());
        fs::read_to_string(&path)
            .map(|s| s.trim().to_string())
            .map_err(|e| StoreError::Io {
                source: e,
                context: format!("Failed to read training marker {}", path.display()),
            })
    }

    fn fetch_version(&self, tenant: &str, version: u64, dest: &Path) -> Result<(), StoreError> {
        let src = self.versions_dir(tenant).join(version.to_string());
        fs::create_dir_all(dest).map_err(|e| StoreError::Io {
            source: e,
            context: format!("Failed to create fetch destination {}", dest.display()),
        })?;
        for entry in fs::read_dir(&src).map_err(|e| StoreError::Io {
            source: e,
            context: format!("Failed to list version files under {}", src.display()),
        })? {
            let entry = entry.map_err(|e| StoreError::Io {
                source: e,
                context: format!("Failed to read version file entry under {}", src.display()),
            })?;
            let path = entry.path();
            if path.is_file() {
                let target = dest.join(entry.file_name());
                fs::copy(&path, &target).map_err(|e| StoreError::Io {
                    source: e,
                    context: format!(
                        "Failed to fetch {} to {}",
                        path.display(),
                        target.display()
                    ),
                })?;
            }
        }
        Ok(())
    }
}
