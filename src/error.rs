use std::path::PathBuf;
use thiserror::Error;

use crate::index::IndexError;
use crate::model::ModelError;
use crate::store::StoreError;

/// Main error type for the diagsearch crate
#[derive(Error, Debug)]
pub enum DiagSearchError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Model package errors (load / verify / refresh attempts)
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Index build errors
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Durable store errors
    #[error(transparent)]
    Store(#[from] StoreError),

    /// No model is loaded for the tenant
    #[error("No model loaded for tenant {tenant}")]
    TenantNotLoaded { tenant: String },

    /// Caller-side query rejection (length limits)
    #[error("Query rejected: {reason}")]
    QueryRejected { reason: String },

    /// A query exceeded its time budget
    #[error("Query timed out after {millis}ms")]
    QueryTimeout { millis: u64 },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for diagsearch operations
pub type Result<T> = std::result::Result<T, DiagSearchError>;
