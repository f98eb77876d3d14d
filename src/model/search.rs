//! Query evaluation against a loaded model package
//!
//! Two operations per the serving contract: detector search (soft
//! failures: empty results plus an error message) and sample-utterance
//! suggestion (soft failures: a null result list, which callers
//! distinguish from zero matches).

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::model::package::{ModelPackage, SampleUtterance};
use crate::text::{all_ngrams, word_count};

/// Raw ranked hits considered before detector dedup on the content-split
/// path, and the utterance suggestion count.
const TOP_K: usize = 10;

/// Queries longer than this many words are split into sub-queries.
const SPLIT_WORD_THRESHOLD: usize = 6;

/// Minimum meaningful words for a sub-query to be evaluated.
const MIN_SUBQUERY_WORDS: usize = 2;

/// A ranked detector recommendation.
#[derive(Debug, Clone, Serialize)]
pub struct DetectorMatch {
    pub detector: String,
    pub score: f32,
}

/// Detector search response. `error` carries per-request failure text;
/// the result list is empty in that case, never absent.
#[derive(Debug, Clone, Serialize)]
pub struct DetectorSearchResponse {
    pub query: String,
    pub results: Vec<DetectorMatch>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A ranked utterance suggestion.
#[derive(Debug, Clone, Serialize)]
pub struct UtteranceMatch {
    #[serde(rename = "sampleUtterance")]
    pub sample_utterance: SampleUtterance,
    pub score: f32,
}

/// Utterance search response. `results` is `None` on failure — callers
/// branch on null vs empty.
#[derive(Debug, Clone, Serialize)]
pub struct UtteranceSearchResponse {
    pub query: String,
    pub results: Option<Vec<UtteranceMatch>>,
}

/// Stateful wrapper exposing query operations over one model package.
pub struct SearchModel {
    package: ModelPackage,
}

impl SearchModel {
    pub fn new(package: ModelPackage) -> Self {
        Self { package }
    }

    /// Version marker of the wrapped package.
    pub fn training_id(&self) -> &str {
        self.package.training_id.as_str()
    }

    pub fn package(&self) -> &ModelPackage {
        &self.package
    }

    /// Rank detectors against a natural-language query.
    ///
    /// Long queries (more than six words after whitespace normalization)
    /// are additionally split on `.`/`,` into sub-queries of at least two
    /// meaningful words; per detector the maximum score across the full
    /// query and every sub-query wins.
    pub fn query_detectors(&self, query: &str) -> DetectorSearchResponse {
        let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");

        if normalized.split_whitespace().count() <= SPLIT_WORD_THRESHOLD {
            let results = self.eval_detectors(&normalized);
            return DetectorSearchResponse {
                query: normalized,
                results,
                error: None,
            };
        }

        let mut runs = vec![normalized.clone()];
        runs.extend(
            normalized
                .split(['.', ','])
                .map(str::trim)
                .filter(|part| word_count(part) >= MIN_SUBQUERY_WORDS)
                .map(str::to_string),
        );

        let mut best: HashMap<String, f32> = HashMap::new();
        for run in &runs {
            for hit in self.eval_detectors(run) {
                let entry = best.entry(hit.detector).or_insert(hit.score);
                if hit.score > *entry {
                    *entry = hit.score;
                }
            }
        }
        let mut results: Vec<DetectorMatch> = best
            .into_iter()
            .map(|(detector, score)| DetectorMatch { detector, score })
            .collect();
        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.detector.cmp(&b.detector))
        });

        DetectorSearchResponse {
            query: normalized,
            results,
            error: None,
        }
    }

    /// Evaluate one query string against the detector index.
    fn eval_detectors(&self, query: &str) -> Vec<DetectorMatch> {
        let tokens = all_ngrams(query, self.package.info.text_ngrams);
        let vector = self
            .package
            .detector_model
            .vectorize(&self.package.dictionary.bow(&tokens));
        let ranked = self.package.detector_index.rank(&vector);

        if self.package.info.detector_content_splitted {
            // Top raw hits resolved through the mapping table; first
            // occurrence per detector wins, so fewer than TOP_K unique
            // detectors may come back.
            let mut seen: HashSet<&str> = HashSet::new();
            let mut results = Vec::new();
            for &(index, score) in ranked.iter().take(TOP_K) {
                if let Some(id) = self.package.resolve_detector(index) {
                    if seen.insert(id) {
                        results.push(DetectorMatch {
                            detector: id.to_string(),
                            score,
                        });
                    }
                }
            }
            results
        } else {
            // One corpus document per detector: the whole corpus ranks.
            ranked
                .iter()
                .map(|&(index, score)| DetectorMatch {
                    detector: self.package.detectors[index].id.clone(),
                    score,
                })
                .collect()
        }
    }

    /// Suggest sample utterances related to a detector description.
    ///
    /// `existing` must be lowercased by the caller; matching corpus texts
    /// are filtered out, and the query is biased away from them by
    /// concatenation before vectorizing. Empty queries are a no-op.
    pub fn query_utterances(
        &self,
        query: &str,
        existing: &HashSet<String>,
    ) -> Option<UtteranceSearchResponse> {
        if query.trim().is_empty() {
            return None;
        }

        let mut known: Vec<&str> = existing.iter().map(String::as_str).collect();
        known.sort_unstable();
        let combined = std::iter::once(query)
            .chain(known)
            .collect::<Vec<_>>()
            .join(" ");

        let side = match self.package.attach_utterances() {
            Ok(side) => side,
            Err(e) => {
                tracing::warn!("Utterance index attach failed: {e}");
                return Some(UtteranceSearchResponse {
                    query: combined,
                    results: None,
                });
            }
        };

        let tokens = all_ngrams(&combined, self.package.info.text_ngrams);
        let vector = side.model.vectorize(&self.package.dictionary.bow(&tokens));
        let results = side
            .index
            .rank(&vector)
            .into_iter()
            .filter(|&(index, _)| !existing.contains(&side.utterances[index].text.to_lowercase()))
            .take(TOP_K)
            .map(|(index, score)| UtteranceMatch {
                sample_utterance: side.utterances[index].clone(),
                score,
            })
            .collect();

        Some(UtteranceSearchResponse {
            query: combined,
            results: Some(results),
        })
    }
}
