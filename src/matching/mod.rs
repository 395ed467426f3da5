//! String-similarity primitives used across the pipeline.
//!
//! Three metrics, each matching the semantics of a specific collaborator:
//! `ratio` is the normalized edit-distance score (0-100) used by the token
//! normalizer, gazetteer matcher and confidence scorer; `trigram_similarity`
//! mirrors the trigram semantics the electoral roll ranks with (0.0-1.0);
//! `word_coverage` is the share of query words present in a geocoder result.

use std::collections::HashSet;

/// Normalized edit-distance similarity on a 0-100 scale.
///
/// Comparisons are byte-for-byte: callers are expected to have case-folded
/// their inputs first, since every threshold in the pipeline was calibrated
/// against uppercase comparisons.
pub fn ratio(a: &str, b: &str) -> u32 {
    if a.is_empty() && b.is_empty() {
        return 100;
    }
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    (strsim::normalized_levenshtein(a, b) * 100.0).round() as u32
}

fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();
    for word in text.to_lowercase().split_whitespace() {
        // pg_trgm pads each word with two leading and one trailing blank.
        let padded: Vec<char> = std::iter::repeat(' ')
            .take(2)
            .chain(word.chars())
            .chain(std::iter::once(' '))
            .collect();
        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }
    set
}

/// Trigram similarity with the same shape as PostgreSQL's `SIMILARITY()`:
/// shared trigrams over the union, 0.0-1.0.
pub fn trigram_similarity(a: &str, b: &str) -> f64 {
    let ta = trigrams(a);
    let tb = trigrams(b);
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    shared as f64 / union as f64
}

/// Percentage (0-100) of the query's words that also appear in the candidate
/// text. Case-insensitive, whole-word.
pub fn word_coverage(query: &str, candidate: &str) -> f64 {
    let query_words: HashSet<String> = query
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();
    if query_words.is_empty() {
        return 0.0;
    }
    let candidate_words: HashSet<String> = candidate
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.to_string())
        .collect();
    let shared = query_words.intersection(&candidate_words).count();
    shared as f64 / query_words.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_of_identical_strings_is_100() {
        assert_eq!(ratio("AVENIDA", "AVENIDA"), 100);
        assert_eq!(ratio("", ""), 100);
    }

    #[test]
    fn ratio_of_disjoint_strings_is_low() {
        assert_eq!(ratio("AVENIDA", ""), 0);
        assert!(ratio("AVENIDA", "XQZW") < 30);
    }

    #[test]
    fn ratio_tolerates_small_typos() {
        // One substitution in a seven-letter word stays above the glossary
        // acceptance threshold.
        assert!(ratio("AVENIDA", "AVENIDA") > ratio("AVENIDA", "ABENIDA"));
        assert!(ratio("AVENIDA", "ABENIDA") >= 80);
    }

    #[test]
    fn trigram_similarity_matches_pg_trgm_shape() {
        assert_eq!(trigram_similarity("PROVIDENCIA", "PROVIDENCIA"), 1.0);
        assert!(trigram_similarity("PROVIDENCIA", "PROVIDENCA") > 0.6);
        assert!(trigram_similarity("PROVIDENCIA", "PUDAHUEL") < 0.2);
        assert_eq!(trigram_similarity("", "PROVIDENCIA"), 0.0);
    }

    #[test]
    fn word_coverage_counts_query_words_only() {
        let candidate = "Av Providencia 1000 Providencia Region Metropolitana Chile";
        assert_eq!(word_coverage("PROVIDENCIA 1000", candidate), 100.0);
        // Splitting is naive: punctuation glued to a word makes it a
        // different token, exactly like the metric the thresholds were
        // calibrated against.
        assert_eq!(word_coverage("PROVIDENCIA 1000", "Providencia 1000,"), 50.0);
        assert_eq!(word_coverage("PROVIDENCIA 1000", ""), 0.0);
        assert_eq!(word_coverage("", candidate), 0.0);
    }
}
