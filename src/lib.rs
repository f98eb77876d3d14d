//! Diagsearch - Diagnostic Detector Search Engine
//!
//! Serves natural-language queries against per-tenant corpora of diagnostic
//! detectors. Each tenant has a versioned, offline-trained TF-IDF model
//! package that is loaded from durable storage, verified, hot-swapped on
//! refresh, and evicted on demand while queries keep being served.

pub mod cli;
pub mod config;
pub mod error;
pub mod index;
pub mod model;
pub mod registry;
pub mod service;
pub mod store;
pub mod sync;
pub mod text;

pub use error::{DiagSearchError, Result};
