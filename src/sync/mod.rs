//! Background model synchronization
//!
//! One watcher task per process polls the durable store on a fixed
//! interval, iterating the configured tenants sequentially. A tenant whose
//! remote training marker differs from the local serving copy gets a
//! refresh; a tenant with no loaded model gets its initial load. Per-tenant
//! failures are logged and retried on the next cycle — one tenant can
//! never stall the others. The first full pass doubles as the startup
//! barrier: queries should not be accepted for a tenant before
//! [`ModelSyncWatcher::wait_until_ready`] resolves.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::registry::ModelRegistry;
use crate::store::{latest_version, ModelStore};

/// Polls durable storage and drives registry refreshes.
pub struct ModelSyncWatcher {
    registry: Arc<ModelRegistry>,
    store: Arc<dyn ModelStore>,
    tenants: Vec<String>,
    interval: Duration,
    ready_tx: watch::Sender<bool>,
    ready_rx: watch::Receiver<bool>,
}

impl ModelSyncWatcher {
    pub fn new(
        registry: Arc<ModelRegistry>,
        store: Arc<dyn ModelStore>,
        tenants: Vec<String>,
        interval: Duration,
    ) -> Self {
        let (ready_tx, ready_rx) = watch::channel(false);
        Self {
            registry,
            store,
            tenants,
            interval,
            ready_tx,
            ready_rx,
        }
    }

    /// Resolves once the first sync pass has completed for every tenant.
    pub async fn wait_until_ready(&self) {
        let mut rx = self.ready_rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// One sequential pass over all tenants.
    pub fn run_once(&self) {
        for tenant in &self.tenants {
            if let Err(e) = self.sync_tenant(tenant) {
                tracing::warn!(tenant = %tenant, "Model sync failed: {e}");
            }
        }
        self.ready_tx.send_replace(true);
    }

    fn sync_tenant(&self, tenant: &str) -> crate::Result<()> {
        let version = match latest_version(self.store.as_ref(), tenant) {
            Ok(version) => version,
            Err(e) => {
                // nothing published yet for this tenant
                tracing::debug!(tenant, "No published versions: {e}");
                return Ok(());
            }
        };
        let remote_marker = self.store.read_training_marker(tenant, version)?;
        let local_marker = self.registry.local_training_marker(tenant);

        if self.registry.get(tenant).is_none() {
            tracing::info!(tenant, "Initial model load");
            self.registry.ensure_loaded(tenant)?;
            // a stale pre-existing disk copy still needs the new version
            if self.registry.local_training_marker(tenant) != remote_marker {
                self.registry.refresh(tenant)?;
            }
        } else if local_marker != remote_marker {
            tracing::info!(
                tenant,
                %local_marker,
                %remote_marker,
                "Model changed in durable store, refreshing"
            );
            self.registry.refresh(tenant)?;
        }
        Ok(())
    }

    /// Run the poll loop until the task is aborted.
    ///
    /// The first pass runs immediately so startup is not delayed by one
    /// full interval.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            loop {
                ticker.tick().await;
                let watcher = Arc::clone(&self);
                let outcome = tokio::task::spawn_blocking(move || watcher.run_once()).await;
                if let Err(e) = outcome {
                    tracing::error!("Model sync pass panicked: {e}");
                }
            }
        })
    }
}
