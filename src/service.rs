//! In-process serving facade
//!
//! What the request-routing collaborator calls: per-tenant query
//! operations with caller-side validation and timeouts, plus the
//! lifecycle operations. Transport, auth, and translation live outside
//! this crate.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::{DiagSearchError, Result};
use crate::model::{DetectorSearchResponse, SearchModel, UtteranceSearchResponse};
use crate::registry::{ModelRegistry, TenantStatus};

/// Async facade over the model registry.
pub struct SearchService {
    registry: Arc<ModelRegistry>,
    min_query_len: usize,
    max_query_len: usize,
    timeout: Duration,
}

impl SearchService {
    pub fn new(registry: Arc<ModelRegistry>, config: &Config) -> Self {
        Self {
            registry,
            min_query_len: config.query.min_query_len,
            max_query_len: config.query.max_query_len,
            timeout: config.query_timeout(),
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Rank detectors for a tenant against a natural-language query.
    ///
    /// Rejects queries shorter than the configured minimum (after
    /// whitespace normalization) or longer than the maximum. The query
    /// runs on a blocking thread bounded by the configured timeout; an
    /// expired timeout abandons the query without affecting anything else
    /// in flight.
    pub async fn query_detectors(&self, tenant: &str, text: &str) -> Result<DetectorSearchResponse> {
        if text.chars().count() > self.max_query_len {
            return Err(DiagSearchError::QueryRejected {
                reason: format!(
                    "Query length exceeded the maximum limit of {}",
                    self.max_query_len
                ),
            });
        }
        let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if normalized.chars().count() < self.min_query_len {
            return Err(DiagSearchError::QueryRejected {
                reason: format!("Minimum query length is {}", self.min_query_len),
            });
        }

        let model = self.model_for(tenant).await?;
        self.run_query(move || model.query_detectors(&normalized))
            .await
    }

    /// Suggest sample utterances for a detector description.
    ///
    /// `existing` utterances are lowercased here; the model filters them
    /// out of the suggestions and biases ranking away from them.
    pub async fn query_utterances(
        &self,
        tenant: &str,
        description: &str,
        existing: Vec<String>,
    ) -> Result<UtteranceSearchResponse> {
        if description.trim().is_empty() {
            return Err(DiagSearchError::QueryRejected {
                reason: "No text provided for search".to_string(),
            });
        }
        let description = description.to_string();
        let existing: HashSet<String> = existing.into_iter().map(|u| u.to_lowercase()).collect();

        let model = self.model_for(tenant).await?;
        self.run_query(move || {
            model
                .query_utterances(&description, &existing)
                .unwrap_or(UtteranceSearchResponse {
                    query: description,
                    results: Some(Vec::new()),
                })
        })
        .await
    }

    /// Load the tenant's model if it is not already active.
    pub async fn ensure_loaded(&self, tenant: &str) -> Result<()> {
        let registry = Arc::clone(&self.registry);
        let tenant = tenant.to_string();
        tokio::task::spawn_blocking(move || registry.ensure_loaded(&tenant))
            .await
            .map_err(anyhow::Error::from)?
    }

    /// Refresh the tenant to the latest durable version.
    ///
    /// Always returns a rendered outcome; a failed refresh leaves the
    /// previously active model serving.
    pub async fn refresh(&self, tenant: &str) -> String {
        let registry = Arc::clone(&self.registry);
        let owned = tenant.to_string();
        let outcome = tokio::task::spawn_blocking(move || registry.refresh(&owned)).await;
        match outcome {
            Ok(Ok(())) => "Refreshed".to_string(),
            Ok(Err(e)) => format!("Failed: {e}"),
            Err(e) => format!("Failed: {e}"),
        }
    }

    /// Drop the tenant's model; the next query loads it again.
    pub async fn evict(&self, tenant: &str) {
        let registry = Arc::clone(&self.registry);
        let tenant = tenant.to_string();
        let _ = tokio::task::spawn_blocking(move || registry.evict(&tenant)).await;
    }

    /// Lifecycle metadata for every loaded tenant.
    pub fn statuses(&self) -> Vec<TenantStatus> {
        self.registry.statuses()
    }

    async fn model_for(&self, tenant: &str) -> Result<Arc<SearchModel>> {
        self.ensure_loaded(tenant).await?;
        self.registry
            .get(tenant)
            .ok_or_else(|| DiagSearchError::TenantNotLoaded {
                tenant: tenant.to_string(),
            })
    }

    async fn run_query<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let millis = self.timeout.as_millis() as u64;
        match tokio::time::timeout(self.timeout, tokio::task::spawn_blocking(query)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(anyhow::Error::from(e).into()),
            Err(_) => Err(DiagSearchError::QueryTimeout { millis }),
        }
    }
}
