//! Shared fixtures: build and publish model packages through the public
//! file-format types, the way the offline trainer writes them.

use std::fs;
use std::path::Path;

use diagsearch::index::{build, Dictionary};
use diagsearch::model::{Detector, DetectorMapping, ModelInfo, SampleUtterance};
use diagsearch::text::all_ngrams;

/// Everything needed to write one package directory.
pub struct PackageSpec<'a> {
    pub detector_texts: &'a [(&'a str, &'a str)],
    pub utterance_texts: &'a [&'a str],
    pub info: Option<ModelInfo>,
    pub mappings: Option<Vec<DetectorMapping>>,
    pub training_id: &'a str,
}

impl Default for PackageSpec<'_> {
    fn default() -> Self {
        Self {
            detector_texts: &[("d1", "disk space low"), ("d2", "cpu usage high")],
            utterance_texts: &["billing failure", "billing issue"],
            info: None,
            mappings: None,
            training_id: "t-001",
        }
    }
}

/// Write a complete package into `dir`.
pub fn write_package(dir: &Path, spec: &PackageSpec) {
    fs::create_dir_all(dir).unwrap();

    let ngrams = spec.info.as_ref().map(|i| i.text_ngrams).unwrap_or(1);
    let detector_corpus: Vec<Vec<String>> = spec
        .detector_texts
        .iter()
        .map(|(_, t)| all_ngrams(t, ngrams))
        .collect();
    let utterance_corpus: Vec<Vec<String>> = spec
        .utterance_texts
        .iter()
        .map(|t| all_ngrams(t, ngrams))
        .collect();

    let all: Vec<Vec<String>> = detector_corpus
        .iter()
        .chain(utterance_corpus.iter())
        .cloned()
        .collect();
    let dict = Dictionary::build(&all);
    let (m1, i1) = build(&detector_corpus, &dict).unwrap();
    let (m2, i2) = build(&utterance_corpus, &dict).unwrap();

    let write = |name: &str, json: String| fs::write(dir.join(name), json).unwrap();
    write("dictionary.dict", serde_json::to_string(&dict).unwrap());
    write("m1.model", serde_json::to_string(&m1).unwrap());
    write("m1.index", serde_json::to_string(&i1).unwrap());
    write("m2.model", serde_json::to_string(&m2).unwrap());
    write("m2.index", serde_json::to_string(&i2).unwrap());

    let detectors: Vec<Detector> = spec
        .detector_texts
        .iter()
        .map(|(id, _)| Detector {
            id: id.to_string(),
            name: None,
            description: None,
        })
        .collect();
    write("Detectors.json", serde_json::to_string(&detectors).unwrap());

    let utterances: Vec<SampleUtterance> = spec
        .utterance_texts
        .iter()
        .map(|t| SampleUtterance {
            text: t.to_string(),
        })
        .collect();
    write(
        "SampleUtterances.json",
        serde_json::to_string(&utterances).unwrap(),
    );

    if let Some(info) = &spec.info {
        write("ModelInfo.json", serde_json::to_string(info).unwrap());
    }
    if let Some(mappings) = &spec.mappings {
        write("Mappings.json", serde_json::to_string(mappings).unwrap());
    }
    fs::write(dir.join("trainingId.txt"), spec.training_id).unwrap();
}

/// Publish a package as `{root}/{tenant}/models/{version}/`.
pub fn publish_version(root: &Path, tenant: &str, version: u64, spec: &PackageSpec) {
    let dir = root.join(tenant).join("models").join(version.to_string());
    write_package(&dir, spec);
}
