//! Text normalization and n-gram tokenization
//!
//! Turns raw query/corpus text into the token sequences the TF-IDF models
//! are built over. Deterministic and pure: the same text always yields the
//! same tokens, and degenerate input yields an empty sequence.

/// English stop words removed before n-gram emission.
///
/// A curated subset of the NLTK list; corpus and queries must go through
/// the same filter for the trained weights to line up.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "all", "am", "an", "and", "any",
    "are", "as", "at", "be", "because", "been", "being", "below", "between",
    "both", "but", "by", "can", "did", "do", "does", "doing", "down",
    "during", "each", "few", "for", "from", "further", "had", "has", "have",
    "having", "he", "her", "here", "hers", "him", "his", "how", "i", "if",
    "in", "into", "is", "it", "its", "just", "me", "more", "most", "my",
    "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or",
    "other", "our", "out", "over", "own", "s", "same", "she", "should",
    "so", "some", "such", "t", "than", "that", "the", "their", "theirs",
    "them", "then", "there", "these", "they", "this", "those", "through",
    "to", "too", "under", "until", "up", "very", "was", "we", "were",
    "what", "when", "where", "which", "while", "who", "whom", "why",
    "will", "with", "you", "your", "yours",
];

/// Pluggable word normalizer.
///
/// The production lemmatizer is an external ML collaborator; the engine
/// only requires word -> word determinism.
pub trait Lemmatize: Send + Sync {
    fn lemma(&self, word: &str) -> String;
}

/// Identity lemmatizer used when no external normalizer is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLemmatizer;

impl Lemmatize for NoopLemmatizer {
    fn lemma(&self, word: &str) -> String {
        word.to_string()
    }
}

/// Strip characters outside `[0-9a-zA-Z ]`, collapsing every run of
/// stripped characters and whitespace into a single space.
pub fn cleanse(text: &str) -> String {
    let replaced: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, cleanse, and split into words with stop words removed.
fn meaningful_words(text: &str, lemmatizer: &dyn Lemmatize) -> Vec<String> {
    cleanse(&text.to_lowercase())
        .split_whitespace()
        .filter(|w| !STOP_WORDS.contains(w))
        .map(|w| lemmatizer.lemma(w))
        .collect()
}

/// Count of meaningful (cleansed, non-stop-word) words in a text.
pub fn word_count(text: &str) -> usize {
    meaningful_words(text, &NoopLemmatizer).len()
}

/// Emit all n-grams of `words` for a single gram size, space-joined.
fn ngrams(words: &[String], n: usize) -> Vec<String> {
    if n == 0 || words.len() < n {
        return Vec::new();
    }
    words.windows(n).map(|w| w.join(" ")).collect()
}

/// Tokenize `text` into all 1..=`max_n` grams.
///
/// `max_n` is clamped to the number of remaining words, so a two-word
/// sentence with `max_n = 3` yields its unigrams and one bigram. Empty or
/// all-stop-word input yields an empty sequence.
pub fn all_ngrams(text: &str, max_n: usize) -> Vec<String> {
    all_ngrams_with(text, max_n, &NoopLemmatizer)
}

/// [`all_ngrams`] with an explicit lemmatizer.
pub fn all_ngrams_with(text: &str, max_n: usize, lemmatizer: &dyn Lemmatize) -> Vec<String> {
    let words = meaningful_words(text, lemmatizer);
    if words.is_empty() {
        return Vec::new();
    }
    let upper = max_n.max(1).min(words.len());
    (1..=upper).flat_map(|n| ngrams(&words, n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanse_strips_special_chars() {
        assert_eq!(cleanse("disk: is full!!"), "disk is full");
        assert_eq!(cleanse("a--b__c"), "a b c");
        assert_eq!(cleanse("   spaced    out   "), "spaced out");
    }

    #[test]
    fn test_empty_input_yields_no_tokens() {
        assert!(all_ngrams("", 3).is_empty());
        assert!(all_ngrams("!!! ???", 3).is_empty());
        // all stop words
        assert!(all_ngrams("the of and", 2).is_empty());
    }

    #[test]
    fn test_unigrams_lowercased_without_stop_words() {
        let tokens = all_ngrams("The Disk is Full", 1);
        assert_eq!(tokens, vec!["disk", "full"]);
    }

    #[test]
    fn test_ngram_emission_order() {
        let tokens = all_ngrams("cpu usage high", 2);
        assert_eq!(
            tokens,
            vec!["cpu", "usage", "high", "cpu usage", "usage high"]
        );
    }

    #[test]
    fn test_max_n_clamped_to_word_count() {
        // two meaningful words, max_n = 5: no grams above bigram
        let tokens = all_ngrams("disk full", 5);
        assert_eq!(tokens, vec!["disk", "full", "disk full"]);
    }

    #[test]
    fn test_deterministic() {
        let a = all_ngrams("slow response from app service", 3);
        let b = all_ngrams("slow response from app service", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn test_custom_lemmatizer_applied() {
        struct Trunc;
        impl Lemmatize for Trunc {
            fn lemma(&self, word: &str) -> String {
                word.chars().take(4).collect()
            }
        }
        let tokens = all_ngrams_with("connections failing", 1, &Trunc);
        assert_eq!(tokens, vec!["conn", "fail"]);
    }

    #[test]
    fn test_word_count_ignores_noise() {
        assert_eq!(word_count("the disk, is full."), 2);
        assert_eq!(word_count(""), 0);
    }
}
