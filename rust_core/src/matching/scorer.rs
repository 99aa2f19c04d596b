//! Composite similarity score between a query and one candidate name.
//!
//! The score is only used to rank and filter candidates; it is not a probability.
//! Weights are fixed:
//!
//! | component                                   | points                 |
//! |---------------------------------------------|------------------------|
//! | base                                        | `10 - edit distance`   |
//! | one compact name contains the other         | `+5`                   |
//! | compact lengths differ by at most 3         | `+3`                   |
//! | each candidate word matching a query word   | `+2`                   |

use super::normalize::normalize;
use super::similarity::distance;

/// Per-word edit tolerance when ranking many candidates.
pub const RANKING_WORD_DISTANCE: usize = 2;
/// Per-word edit tolerance of the near-duplicate board detector.
pub const NEAR_DUPLICATE_WORD_DISTANCE: usize = 1;

const BASE_SCORE: f64 = 10.0;
const CONTAINMENT_BONUS: f64 = 5.0;
const LENGTH_BONUS: f64 = 3.0;
const LENGTH_TOLERANCE: usize = 3;
const WORD_MATCH_BONUS: f64 = 2.0;

/// Every component of a score, kept for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    /// Edit distance between the compact normalized names.
    pub distance: usize,
    /// One compact normalized name contains the other.
    pub contains: bool,
    pub matching_words: usize,
    pub score: f64,
}

/// Score `candidate` against `query` with the ranking word tolerance.
/// Neither side is prefix-stripped here; the caller decides.
pub fn score(query: &str, candidate: &str) -> f64 {
    score_detailed(query, candidate, RANKING_WORD_DISTANCE).score
}

pub fn score_detailed(query: &str, candidate: &str, word_distance: usize) -> ScoreBreakdown {
    let query_compact = normalize(query).compact();
    let candidate_compact = normalize(candidate).compact();

    let distance = distance(&candidate_compact, &query_compact);
    let mut score = BASE_SCORE - distance as f64;

    let contains = contains_either(&candidate_compact, &query_compact);
    if contains {
        score += CONTAINMENT_BONUS;
    }

    let length_diff = candidate_compact
        .chars()
        .count()
        .abs_diff(query_compact.chars().count());
    if length_diff <= LENGTH_TOLERANCE {
        score += LENGTH_BONUS;
    }

    let matching_words =
        matching_word_count(&raw_words(candidate), &raw_words(query), word_distance);
    score += WORD_MATCH_BONUS * matching_words as f64;

    ScoreBreakdown {
        distance,
        contains,
        matching_words,
        score,
    }
}

/// Lowercased whitespace-delimited words of the original (uncleaned) text.
pub fn raw_words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Two words match when either contains the other or they are at most
/// `max_distance` edits apart.
pub fn words_match(a: &str, b: &str, max_distance: usize) -> bool {
    a.contains(b) || b.contains(a) || distance(a, b) <= max_distance
}

/// Number of candidate words with at least one matching query word.
pub fn matching_word_count(
    candidate_words: &[String],
    query_words: &[String],
    max_distance: usize,
) -> usize {
    candidate_words
        .iter()
        .filter(|word| {
            query_words
                .iter()
                .any(|query_word| words_match(word, query_word, max_distance))
        })
        .count()
}

pub(crate) fn contains_either(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}
