//! Model package loading and query evaluation
//!
//! A model package is the on-disk artifact produced by the offline trainer
//! for one tenant and one training run. `package` owns the typed manifest,
//! verification, and parsing; `search` wraps a loaded package and exposes
//! the two query operations.

mod package;
mod search;

#[cfg(test)]
pub(crate) use package::testkit;

pub use package::{
    Detector, DetectorMapping, ModelError, ModelInfo, ModelPackage, ModelType, PackageFile,
    SampleUtterance,
};
pub use search::{
    DetectorMatch, DetectorSearchResponse, SearchModel, UtteranceMatch, UtteranceSearchResponse,
};
