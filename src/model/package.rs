//! On-disk model package: typed manifest, verification, parsing
//!
//! Package layout (one directory per tenant, current version only):
//! `dictionary.dict`, `m1.model`/`m1.index` (detector corpus),
//! `m2.model`/`m2.index` (utterance corpus), `Detectors.json`,
//! `SampleUtterances.json`, `Mappings.json` (content-split packages only),
//! `ModelInfo.json` (optional, defaults), `trainingId.txt` (optional).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::index::{Dictionary, IndexFile, SimilarityIndex, TfIdfModel};

#[derive(Error, Debug)]
pub enum ModelError {
    /// A required package file is absent or unreadable. Blocks the load or
    /// refresh attempt; never affects a currently-served model.
    #[error("Required model file missing: {file}")]
    FileMissing { file: String },

    /// A present file failed to parse or is inconsistent with its peers.
    #[error("Failed to load model file {file}: {reason}")]
    FileLoadFailed { file: String, reason: String },

    /// Corpus sanity threshold not met.
    #[error("Too few corpus documents: found {found}, required at least {required}")]
    TooFewDocuments { found: usize, required: usize },

    /// The package declares a model type this engine cannot serve.
    #[error("Unsupported model type: {model_type}")]
    UnsupportedModelType { model_type: String },
}

/// Roles a file can play inside a package, mapped to fixed file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageFile {
    Dictionary,
    DetectorModel,
    DetectorIndex,
    UtteranceModel,
    UtteranceIndex,
    Detectors,
    SampleUtterances,
    Mappings,
    ModelInfo,
    TrainingId,
}

impl PackageFile {
    pub fn file_name(self) -> &'static str {
        match self {
            PackageFile::Dictionary => "dictionary.dict",
            PackageFile::DetectorModel => "m1.model",
            PackageFile::DetectorIndex => "m1.index",
            PackageFile::UtteranceModel => "m2.model",
            PackageFile::UtteranceIndex => "m2.index",
            PackageFile::Detectors => "Detectors.json",
            PackageFile::SampleUtterances => "SampleUtterances.json",
            PackageFile::Mappings => "Mappings.json",
            PackageFile::ModelInfo => "ModelInfo.json",
            PackageFile::TrainingId => "trainingId.txt",
        }
    }

    /// The file set that must be present for a package to load.
    fn required(content_splitted: bool) -> Vec<PackageFile> {
        let mut files = vec![
            PackageFile::Dictionary,
            PackageFile::DetectorModel,
            PackageFile::DetectorIndex,
            PackageFile::UtteranceModel,
            PackageFile::UtteranceIndex,
            PackageFile::Detectors,
            PackageFile::SampleUtterances,
        ];
        if content_splitted {
            files.push(PackageFile::Mappings);
        }
        files
    }
}

/// Resolved file paths for one package directory.
#[derive(Debug, Clone)]
struct PackageManifest {
    root: PathBuf,
}

impl PackageManifest {
    fn path(&self, file: PackageFile) -> PathBuf {
        self.root.join(file.file_name())
    }
}

/// Trained model type declared by the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ModelType {
    #[default]
    #[serde(rename = "TfIdfSearchModel")]
    TfIdf,
    #[serde(rename = "WmdSearchModel")]
    Wmd,
}

/// Per-package configuration written by the trainer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    #[serde(rename = "modelType", default)]
    pub model_type: ModelType,
    #[serde(rename = "detectorContentSplitted", default)]
    pub detector_content_splitted: bool,
    #[serde(rename = "textNGrams", default = "default_ngrams")]
    pub text_ngrams: usize,
}

fn default_ngrams() -> usize {
    1
}

impl Default for ModelInfo {
    fn default() -> Self {
        Self {
            model_type: ModelType::TfIdf,
            detector_content_splitted: false,
            text_ngrams: default_ngrams(),
        }
    }
}

/// A diagnostic detector the engine can recommend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detector {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Index-range -> detector mapping for content-split packages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorMapping {
    #[serde(rename = "startindex")]
    pub start_index: usize,
    #[serde(rename = "endindex")]
    pub end_index: usize,
    pub id: String,
}

/// One document of the secondary utterance corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleUtterance {
    pub text: String,
}

/// The utterance side of a package: kept unloaded at steady state and
/// attached on first utterance query.
#[derive(Debug)]
pub(crate) struct UtteranceSide {
    pub model: TfIdfModel,
    pub index: SimilarityIndex,
    pub utterances: Vec<SampleUtterance>,
}

/// A parsed, verified model package for one tenant.
///
/// Immutable after construction except for the utterance-side attach,
/// which is guarded so concurrent utterance queries load it once.
#[derive(Debug)]
pub struct ModelPackage {
    manifest: PackageManifest,
    pub info: ModelInfo,
    pub training_id: String,
    pub dictionary: Dictionary,
    pub(crate) detector_model: TfIdfModel,
    pub(crate) detector_index: SimilarityIndex,
    pub detectors: Vec<Detector>,
    mappings: Option<Vec<DetectorMapping>>,
    utterance: Mutex<Option<Arc<UtteranceSide>>>,
}

impl ModelPackage {
    /// Load and verify the package at `root`.
    ///
    /// Nothing is constructed unless every required file is present and
    /// parses; the utterance side is parsed for structural validity and
    /// immediately released to bound steady-state memory.
    pub fn load(root: &Path, min_corpus_docs: usize) -> Result<Self, ModelError> {
        let manifest = PackageManifest {
            root: root.to_path_buf(),
        };

        // Optional, defaults on absence or parse failure.
        let info: ModelInfo = read_json(&manifest.path(PackageFile::ModelInfo))
            .ok()
            .unwrap_or_default();

        if info.model_type == ModelType::Wmd {
            return Err(ModelError::UnsupportedModelType {
                model_type: "WmdSearchModel".to_string(),
            });
        }

        for file in PackageFile::required(info.detector_content_splitted) {
            verify_file(&manifest.path(file))?;
        }

        let dictionary: Dictionary = read_json(&manifest.path(PackageFile::Dictionary))?;
        let detector_model: TfIdfModel = read_json(&manifest.path(PackageFile::DetectorModel))?;
        let detector_file: IndexFile = read_json(&manifest.path(PackageFile::DetectorIndex))?;
        let detectors: Vec<Detector> = read_json(&manifest.path(PackageFile::Detectors))?;

        if detector_file.num_features != dictionary.len() {
            return Err(ModelError::FileLoadFailed {
                file: PackageFile::DetectorIndex.file_name().to_string(),
                reason: format!(
                    "index has {} features but dictionary has {} tokens",
                    detector_file.num_features,
                    dictionary.len()
                ),
            });
        }

        let corpus_size = detector_file.docs.len();
        if corpus_size < min_corpus_docs {
            return Err(ModelError::TooFewDocuments {
                found: corpus_size,
                required: min_corpus_docs,
            });
        }

        let mappings = if info.detector_content_splitted {
            let mappings: Vec<DetectorMapping> = read_json(&manifest.path(PackageFile::Mappings))?;
            if let Some(bad) = mappings.iter().find(|m| m.end_index >= corpus_size) {
                return Err(ModelError::FileLoadFailed {
                    file: PackageFile::Mappings.file_name().to_string(),
                    reason: format!(
                        "mapping for detector {} ends at index {} but the corpus has {} documents",
                        bad.id, bad.end_index, corpus_size
                    ),
                });
            }
            Some(mappings)
        } else {
            if detectors.len() != corpus_size {
                return Err(ModelError::FileLoadFailed {
                    file: PackageFile::Detectors.file_name().to_string(),
                    reason: format!(
                        "{} detectors for {} corpus documents",
                        detectors.len(),
                        corpus_size
                    ),
                });
            }
            None
        };

        // Structural validation of the utterance side; dropped right after.
        load_utterance_side(&manifest, &dictionary)?;

        let training_id = fs::read_to_string(manifest.path(PackageFile::TrainingId))
            .map(|s| s.trim().to_string())
            .unwrap_or_default();

        Ok(Self {
            manifest,
            info,
            training_id,
            dictionary,
            detector_model,
            detector_index: SimilarityIndex::from(detector_file),
            detectors,
            mappings,
            utterance: Mutex::new(None),
        })
    }

    /// Number of documents in the detector corpus.
    pub fn detector_corpus_size(&self) -> usize {
        self.detector_index.len()
    }

    /// Resolve a ranked document index to its owning detector id.
    ///
    /// First matching range wins; unmapped indices yield `None`.
    pub(crate) fn resolve_detector(&self, index: usize) -> Option<&str> {
        self.mappings.as_ref().and_then(|mappings| {
            mappings
                .iter()
                .find(|m| m.start_index <= index && index <= m.end_index)
                .map(|m| m.id.as_str())
        })
    }

    /// Attach the utterance side, loading it if currently detached.
    ///
    /// Concurrent callers attach once; the side stays resident for the
    /// package's remaining lifetime.
    pub(crate) fn attach_utterances(&self) -> Result<Arc<UtteranceSide>, ModelError> {
        let mut guard = self.utterance.lock().unwrap();
        if let Some(side) = guard.as_ref() {
            return Ok(Arc::clone(side));
        }
        let side = Arc::new(load_utterance_side(&self.manifest, &self.dictionary)?);
        *guard = Some(Arc::clone(&side));
        Ok(side)
    }
}

/// Parse and cross-check the utterance model, index, and corpus.
fn load_utterance_side(
    manifest: &PackageManifest,
    dictionary: &Dictionary,
) -> Result<UtteranceSide, ModelError> {
    let model: TfIdfModel = read_json(&manifest.path(PackageFile::UtteranceModel))?;
    let file: IndexFile = read_json(&manifest.path(PackageFile::UtteranceIndex))?;
    let utterances: Vec<SampleUtterance> =
        read_json(&manifest.path(PackageFile::SampleUtterances))?;

    if file.num_features != dictionary.len() {
        return Err(ModelError::FileLoadFailed {
            file: PackageFile::UtteranceIndex.file_name().to_string(),
            reason: format!(
                "index has {} features but dictionary has {} tokens",
                file.num_features,
                dictionary.len()
            ),
        });
    }
    if utterances.len() != file.docs.len() {
        return Err(ModelError::FileLoadFailed {
            file: PackageFile::SampleUtterances.file_name().to_string(),
            reason: format!(
                "{} utterances for {} corpus documents",
                utterances.len(),
                file.docs.len()
            ),
        });
    }

    Ok(UtteranceSide {
        model,
        index: SimilarityIndex::from(file),
        utterances,
    })
}

/// Check a required file is present and readable.
fn verify_file(path: &Path) -> Result<(), ModelError> {
    fs::File::open(path).map_err(|_| ModelError::FileMissing {
        file: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string()),
    })?;
    Ok(())
}

/// Read and deserialize a JSON package file.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let content = fs::read_to_string(path).map_err(|_| ModelError::FileMissing {
        file: file_name.clone(),
    })?;
    serde_json::from_str(&content).map_err(|e| ModelError::FileLoadFailed {
        file: file_name,
        reason: e.to_string(),
    })
}
