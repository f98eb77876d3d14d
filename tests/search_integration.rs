//! End-to-end query behavior over real package directories

mod common;

use std::collections::HashSet;
use tempfile::TempDir;

use common::{write_package, PackageSpec};
use diagsearch::model::{DetectorMapping, ModelInfo, ModelPackage, ModelType, SearchModel};

fn load(dir: &std::path::Path) -> SearchModel {
    SearchModel::new(ModelPackage::load(dir, 1).unwrap())
}

#[test]
fn detector_search_ranks_by_token_overlap() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path(), &PackageSpec::default());
    let model = load(temp.path());

    let response = model.query_detectors("disk is full");
    assert!(response.error.is_none());
    assert_eq!(response.results[0].detector, "d1");
    assert!(response.results[0].score > response.results[1].score);
    assert!(response.results[0].score > 0.0);
    assert!(response.results[0].score <= 1.0);
}

#[test]
fn non_split_model_returns_every_detector() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path(), &PackageSpec::default());
    let model = load(temp.path());

    // no token overlap at all: still one entry per corpus document
    let response = model.query_detectors("zebra xylophone");
    assert_eq!(response.results.len(), 2);
    assert!(response.results.iter().all(|r| r.score == 0.0));
}

#[test]
fn split_model_resolves_and_dedupes_detector_ids() {
    let temp = TempDir::new().unwrap();
    write_package(
        temp.path(),
        &PackageSpec {
            detector_texts: &[
                ("0", "disk space alert"),
                ("1", "disk almost full"),
                ("2", "free disk below threshold"),
                ("3", "cpu spike detected"),
                ("4", "sustained cpu pressure"),
                ("5", "cpu throttling engaged"),
            ],
            info: Some(ModelInfo {
                model_type: ModelType::TfIdf,
                detector_content_splitted: true,
                text_ngrams: 1,
            }),
            mappings: Some(vec![
                DetectorMapping {
                    start_index: 0,
                    end_index: 2,
                    id: "d-disk".to_string(),
                },
                DetectorMapping {
                    start_index: 3,
                    end_index: 5,
                    id: "d-cpu".to_string(),
                },
            ]),
            ..PackageSpec::default()
        },
    );
    let model = load(temp.path());

    let response = model.query_detectors("disk full cpu");
    let ids: Vec<&str> = response
        .results
        .iter()
        .map(|r| r.detector.as_str())
        .collect();
    // six raw hits collapse to one entry per detector, highest first
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&"d-disk") && ids.contains(&"d-cpu"));
    assert!(response.results[0].score >= response.results[1].score);
}

#[test]
fn long_queries_split_and_merge_max_scores() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path(), &PackageSpec::default());
    let model = load(temp.path());

    let long = "our customers keep complaining, disk is completely full, cpu usage is high";
    let merged = model.query_detectors(long);
    assert!(merged.error.is_none());

    // the merged score for d1 can never be lower than what the disk
    // sub-query alone achieves
    let sub = model.query_detectors("disk is completely full");
    let sub_d1 = sub
        .results
        .iter()
        .find(|r| r.detector == "d1")
        .map(|r| r.score)
        .unwrap();
    let merged_d1 = merged
        .results
        .iter()
        .find(|r| r.detector == "d1")
        .map(|r| r.score)
        .unwrap();
    assert!(merged_d1 >= sub_d1);
}

#[test]
fn utterance_search_excludes_existing_and_caps_results() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path(), &PackageSpec::default());
    let model = load(temp.path());

    let existing: HashSet<String> = ["billing failure".to_string()].into_iter().collect();
    let response = model.query_utterances("billing error", &existing).unwrap();
    let results = response.results.expect("utterance search should succeed");
    let texts: Vec<&str> = results
        .iter()
        .map(|m| m.sample_utterance.text.as_str())
        .collect();
    assert!(texts.contains(&"billing issue"));
    assert!(!texts.contains(&"billing failure"));
}

#[test]
fn ngram_models_match_multiword_phrases() {
    let temp = TempDir::new().unwrap();
    write_package(
        temp.path(),
        &PackageSpec {
            detector_texts: &[
                ("d1", "connection pool exhausted"),
                ("d2", "connection timeout upstream"),
            ],
            info: Some(ModelInfo {
                model_type: ModelType::TfIdf,
                detector_content_splitted: false,
                text_ngrams: 2,
            }),
            ..PackageSpec::default()
        },
    );
    let model = load(temp.path());

    // the bigram "connection pool" only exists in d1
    let response = model.query_detectors("connection pool errors");
    assert_eq!(response.results[0].detector, "d1");
    assert!(response.results[0].score > response.results[1].score);
}

#[test]
fn responses_serialize_with_wire_field_names() {
    let temp = TempDir::new().unwrap();
    write_package(temp.path(), &PackageSpec::default());
    let model = load(temp.path());

    let detectors = serde_json::to_value(model.query_detectors("disk is full")).unwrap();
    assert!(detectors.get("query").is_some());
    assert!(detectors["results"][0].get("detector").is_some());
    assert!(detectors["results"][0].get("score").is_some());

    let utterances = serde_json::to_value(
        model
            .query_utterances("billing error", &HashSet::new())
            .unwrap(),
    )
    .unwrap();
    assert!(utterances["results"][0].get("sampleUtterance").is_some());
    assert!(utterances["results"][0]["sampleUtterance"]
        .get("text")
        .is_some());
}
