//! TF-IDF vector index over a fixed corpus
//!
//! A trained model package carries, per corpus (detectors, sample
//! utterances): the shared vocabulary (`dictionary.dict`), per-token IDF
//! weights (`m*.model`) and L2-normalized document vectors (`m*.index`).
//! This module owns those on-disk schemas and the in-memory structures
//! built from them. Indexes are immutable once built; ranking is a dense
//! cosine pass over every document.

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Cannot build an index over an empty corpus")]
    EmptyCorpus,
}

/// Sparse (token id, weight) pairs. Absent ids are weight zero.
pub type SparseVector = Vec<(u32, f32)>;

/// Bidirectional token <-> id mapping, fixed at training time.
///
/// Ids are stable within one package version only; serialized as the
/// ordered token list (`dictionary.dict`), id = position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Dictionary {
    tokens: Vec<String>,
    ids: HashMap<String, u32>,
}

impl From<Vec<String>> for Dictionary {
    fn from(tokens: Vec<String>) -> Self {
        let ids = tokens
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i as u32))
            .collect();
        Self { tokens, ids }
    }
}

impl From<Dictionary> for Vec<String> {
    fn from(dict: Dictionary) -> Self {
        dict.tokens
    }
}

impl Dictionary {
    /// Build a dictionary over a token corpus, ids in first-seen order.
    pub fn build(corpus: &[Vec<String>]) -> Self {
        let mut tokens = Vec::new();
        let mut ids = HashMap::new();
        for doc in corpus {
            for token in doc {
                if !ids.contains_key(token) {
                    ids.insert(token.clone(), tokens.len() as u32);
                    tokens.push(token.clone());
                }
            }
        }
        Self { tokens, ids }
    }

    pub fn id(&self, token: &str) -> Option<u32> {
        self.ids.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Map a token sequence to (id, count) pairs; unknown tokens ignored.
    pub fn bow(&self, tokens: &[String]) -> SparseVector {
        let mut counts: HashMap<u32, f32> = HashMap::new();
        for token in tokens {
            if let Some(id) = self.id(token) {
                *counts.entry(id).or_insert(0.0) += 1.0;
            }
        }
        let mut bow: SparseVector = counts.into_iter().collect();
        bow.sort_by_key(|&(id, _)| id);
        bow
    }
}

/// Trained IDF weights (`m*.model`): `idf[token id] = log2(N / df)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfIdfModel {
    pub num_docs: usize,
    pub idf: Vec<f32>,
}

impl TfIdfModel {
    /// Weight a bag-of-words into an L2-normalized TF-IDF vector.
    ///
    /// Zero-weight entries are dropped; a query with no known non-ubiquitous
    /// tokens yields an empty vector, which ranks every document at 0.
    pub fn vectorize(&self, bow: &SparseVector) -> SparseVector {
        let mut weighted: SparseVector = bow
            .iter()
            .filter_map(|&(id, tf)| {
                let idf = self.idf.get(id as usize).copied().unwrap_or(0.0);
                let w = tf * idf;
                (w > 0.0).then_some((id, w))
            })
            .collect();
        let norm = weighted
            .iter()
            .map(|&(_, w)| w * w)
            .sum::<f32>()
            .sqrt();
        if norm > 0.0 {
            for entry in &mut weighted {
                entry.1 /= norm;
            }
        }
        weighted
    }
}

/// On-disk similarity index (`m*.index`): one L2-normalized sparse
/// document vector per corpus document, in corpus order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexFile {
    pub num_features: usize,
    pub docs: Vec<SparseVector>,
}

/// Dense, immutable similarity structure over a fixed corpus.
///
/// Rows are L2-normalized document vectors; ranking a normalized query is
/// a single matrix-vector product yielding cosine similarity per document.
#[derive(Debug)]
pub struct SimilarityIndex {
    num_features: usize,
    matrix: Array2<f32>,
}

impl From<IndexFile> for SimilarityIndex {
    fn from(file: IndexFile) -> Self {
        let mut matrix = Array2::zeros((file.docs.len(), file.num_features));
        for (row, doc) in file.docs.iter().enumerate() {
            for &(id, w) in doc {
                if (id as usize) < file.num_features {
                    matrix[[row, id as usize]] = w;
                }
            }
        }
        Self {
            num_features: file.num_features,
            matrix,
        }
    }
}

impl SimilarityIndex {
    /// Number of documents in the corpus.
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Rank every corpus document against a normalized query vector.
    ///
    /// Returns (document index, cosine score) sorted descending by score;
    /// equal scores keep ascending document order (stable sort). A
    /// degenerate (empty) query scores every document 0 rather than
    /// failing.
    pub fn rank(&self, query: &SparseVector) -> Vec<(usize, f32)> {
        let mut dense = Array1::zeros(self.num_features);
        for &(id, w) in query {
            if (id as usize) < self.num_features {
                dense[id as usize] = w;
            }
        }
        let scores = self.matrix.dot(&dense);
        let mut ranked: Vec<(usize, f32)> = scores
            .iter()
            .enumerate()
            .map(|(i, &s)| (i, s.clamp(0.0, 1.0)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// Build TF-IDF weights and a similarity index over a token corpus.
///
/// IDF is `log2(N / df)` per token (tokens present in every document weigh
/// zero). Used by the offline trainer and by test fixtures; the serving
/// path reconstructs the same structures from the package files.
pub fn build(
    corpus: &[Vec<String>],
    dictionary: &Dictionary,
) -> std::result::Result<(TfIdfModel, IndexFile), IndexError> {
    if corpus.is_empty() {
        return Err(IndexError::EmptyCorpus);
    }
    let num_docs = corpus.len();
    let num_features = dictionary.len();

    let mut df = vec![0usize; num_features];
    let bows: Vec<SparseVector> = corpus.iter().map(|doc| dictionary.bow(doc)).collect();
    for bow in &bows {
        for &(id, _) in bow {
            df[id as usize] += 1;
        }
    }
    let idf: Vec<f32> = df
        .iter()
        .map(|&d| {
            if d == 0 {
                0.0
            } else {
                (num_docs as f32 / d as f32).log2()
            }
        })
        .collect();

    let model = TfIdfModel { num_docs, idf };
    let docs: Vec<SparseVector> = bows.iter().map(|bow| model.vectorize(bow)).collect();
    Ok((
        model,
        IndexFile {
            num_features,
            docs,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::all_ngrams;

    fn tokenized(texts: &[&str]) -> Vec<Vec<String>> {
        texts.iter().map(|t| all_ngrams(t, 1)).collect()
    }

    fn build_for(texts: &[&str]) -> (Dictionary, TfIdfModel, SimilarityIndex) {
        let corpus = tokenized(texts);
        let dict = Dictionary::build(&corpus);
        let (model, index_file) = build(&corpus, &dict).unwrap();
        (dict, model, SimilarityIndex::from(index_file))
    }

    #[test]
    fn test_empty_corpus_rejected() {
        let dict = Dictionary::build(&[]);
        assert!(matches!(build(&[], &dict), Err(IndexError::EmptyCorpus)));
    }

    #[test]
    fn test_bow_ignores_unknown_tokens() {
        let corpus = tokenized(&["disk space low"]);
        let dict = Dictionary::build(&corpus);
        let bow = dict.bow(&[
            "disk".to_string(),
            "quota".to_string(),
            "disk".to_string(),
        ]);
        assert_eq!(bow.len(), 1);
        assert_eq!(bow[0].1, 2.0);
    }

    #[test]
    fn test_rank_sorted_descending_with_stable_ties() {
        let (dict, model, index) =
            build_for(&["disk space low", "cpu usage high", "memory usage high"]);
        let query = model.vectorize(&dict.bow(&all_ngrams("usage high", 1)));
        let ranked = index.rank(&query);
        assert_eq!(ranked.len(), 3);
        for pair in ranked.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
            if (pair[0].1 - pair[1].1).abs() < f32::EPSILON {
                assert!(pair[0].0 < pair[1].0);
            }
        }
        // the zero-overlap document comes last with score 0
        assert_eq!(ranked[2].0, 0);
        assert_eq!(ranked[2].1, 0.0);
    }

    #[test]
    fn test_degenerate_query_scores_all_zero() {
        let (dict, model, index) = build_for(&["disk space low", "cpu usage high"]);
        let query = model.vectorize(&dict.bow(&all_ngrams("unrelated words entirely", 1)));
        assert!(query.is_empty());
        let ranked = index.rank(&query);
        assert_eq!(ranked.len(), 2);
        assert!(ranked.iter().all(|&(_, s)| s == 0.0));
        // zero scores keep corpus order
        assert_eq!(ranked[0].0, 0);
        assert_eq!(ranked[1].0, 1);
    }

    #[test]
    fn test_vectorize_is_normalized() {
        let (dict, model, _) = build_for(&["disk space low", "cpu usage high"]);
        let query = model.vectorize(&dict.bow(&all_ngrams("disk space", 1)));
        let norm: f32 = query.iter().map(|&(_, w)| w * w).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ubiquitous_token_weighs_zero() {
        // "usage" appears in every document: idf = log2(1) = 0
        let (dict, model, _) = build_for(&["disk usage", "cpu usage"]);
        let id = dict.id("usage").unwrap();
        assert_eq!(model.idf[id as usize], 0.0);
        let query = model.vectorize(&dict.bow(&["usage".to_string()]));
        assert!(query.is_empty());
    }

    #[test]
    fn test_index_file_round_trip() {
        let corpus = tokenized(&["disk space low", "cpu usage high"]);
        let dict = Dictionary::build(&corpus);
        let (model, index_file) = build(&corpus, &dict).unwrap();

        let json = serde_json::to_string(&index_file).unwrap();
        let reloaded: IndexFile = serde_json::from_str(&json).unwrap();
        let index = SimilarityIndex::from(reloaded);

        let query = model.vectorize(&dict.bow(&all_ngrams("disk space", 1)));
        let ranked = index.rank(&query);
        assert_eq!(ranked[0].0, 0);
        assert!(ranked[0].1 > ranked[1].1);
    }

    #[test]
    fn test_dictionary_serde_preserves_ids() {
        let corpus = tokenized(&["disk space low", "cpu usage high"]);
        let dict = Dictionary::build(&corpus);
        let json = serde_json::to_string(&dict).unwrap();
        let reloaded: Dictionary = serde_json::from_str(&json).unwrap();
        assert_eq!(dict.len(), reloaded.len());
        assert_eq!(dict.id("disk"), reloaded.id("disk"));
        assert_eq!(dict.id("high"), reloaded.id("high"));
    }
}
