use std::hash::Hash;

use ahash::AHashSet;
use strsim::{jaro_winkler, normalized_levenshtein};

use crate::config::{FuzzyAlgorithm, ScoringConfig};

/// Normalize text: lowercase, turn non-alphanumerics into spaces, collapse whitespace
fn normalize_text(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokenize and sort tokens alphabetically
fn tokenize_and_sort(s: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = s.split_whitespace().collect();
    tokens.sort_unstable();
    tokens
}

/// Token sort ratio on a 0.0-100.0 scale.
///
/// Both strings are lowercased, stripped of punctuation and their tokens
/// sorted before the character-level comparison, so the ratio ignores case,
/// punctuation and word order. A side with no alphanumerics scores 0.0.
pub fn token_sort_ratio(s1: &str, s2: &str, algorithm: FuzzyAlgorithm) -> f64 {
    let norm1 = normalize_text(s1);
    let norm2 = normalize_text(s2);
    if norm1.is_empty() || norm2.is_empty() {
        return 0.0;
    }

    let sorted1 = tokenize_and_sort(&norm1).join(" ");
    let sorted2 = tokenize_and_sort(&norm2).join(" ");

    let ratio = match algorithm {
        FuzzyAlgorithm::Levenshtein => normalized_levenshtein(&sorted1, &sorted2),
        FuzzyAlgorithm::JaroWinkler => jaro_winkler(&sorted1, &sorted2),
    };
    ratio * 100.0
}

/// Jaccard index of two token sequences treated as sets.
///
/// Returns 0.0 when either side is empty.
pub fn jaccard<T: Eq + Hash>(a: &[T], b: &[T]) -> f64 {
    let set_a: AHashSet<&T> = a.iter().collect();
    let set_b: AHashSet<&T> = b.iter().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;
    intersection as f64 / union as f64
}

/// Both signals behind a combined score, kept for explaining a decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub overlap: f64,
    pub fuzzy: f64,
    pub combined: f64,
}

/// Weighted blend of token-set overlap and whole-string fuzzy similarity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityScorer {
    overlap_weight: f64,
    fuzzy_weight: f64,
    algorithm: FuzzyAlgorithm,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

impl SimilarityScorer {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            overlap_weight: config.overlap_weight,
            fuzzy_weight: config.fuzzy_weight,
            algorithm: config.fuzzy_algorithm,
        }
    }

    /// Combined score in [0, 1].
    ///
    /// Overlap compares the lemma sequences, fuzzy compares the raw titles.
    pub fn score<S: Eq + Hash>(
        &self,
        query_tokens: &[S],
        query_raw: &str,
        candidate_tokens: &[S],
        candidate_raw: &str,
    ) -> f64 {
        self.breakdown(query_tokens, query_raw, candidate_tokens, candidate_raw)
            .combined
    }

    pub fn breakdown<S: Eq + Hash>(
        &self,
        query_tokens: &[S],
        query_raw: &str,
        candidate_tokens: &[S],
        candidate_raw: &str,
    ) -> ScoreBreakdown {
        let overlap = jaccard(query_tokens, candidate_tokens);
        let fuzzy = token_sort_ratio(query_raw, candidate_raw, self.algorithm) / 100.0;
        let combined = (self.overlap_weight * overlap + self.fuzzy_weight * fuzzy).clamp(0.0, 1.0);
        ScoreBreakdown {
            overlap,
            fuzzy,
            combined,
        }
    }
}
