//! Text scoring primitives used by the in-memory store
//!
//! - Substring pattern scoring
//! - pg_trgm-style trigram similarity

use std::collections::HashSet;

/// Lowercase alphanumeric terms
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Percentage of `content` covered by non-overlapping, case-insensitive
/// occurrences of `query`; `None` when the query does not occur.
pub fn pattern_score(content: &str, query: &str) -> Option<f64> {
    let needle = query.to_lowercase();
    if needle.is_empty() {
        return None;
    }
    let haystack = content.to_lowercase();
    let occurrences = haystack.matches(needle.as_str()).count();
    if occurrences == 0 {
        return None;
    }

    let content_chars = haystack.chars().count().max(1) as f64;
    let needle_chars = needle.chars().count() as f64;
    Some(occurrences as f64 * needle_chars * 100.0 / content_chars)
}

/// Trigrams of each word padded with two leading and one trailing space
pub fn trigrams(text: &str) -> HashSet<String> {
    let mut grams = HashSet::new();
    for word in tokenize(text) {
        let padded: Vec<char> = format!("  {} ", word).chars().collect();
        for window in padded.windows(3) {
            grams.insert(window.iter().collect());
        }
    }
    grams
}

/// Jaccard similarity of two trigram sets
pub fn trigram_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let shared = a.intersection(b).count() as f64;
    let union = (a.len() + b.len()) as f64 - shared;
    shared / union
}

/// Best trigram similarity between the query and any run of consecutive
/// content words as long as the query.
pub fn word_similarity(query: &str, content: &str) -> f64 {
    let query_grams = trigrams(query);
    if query_grams.is_empty() {
        return 0.0;
    }

    let words = tokenize(content);
    if words.is_empty() {
        return 0.0;
    }

    let width = tokenize(query).len().clamp(1, words.len());
    words
        .windows(width)
        .map(|window| trigram_similarity(&query_grams, &trigrams(&window.join(" "))))
        .fold(0.0, f64::max)
}
