//! Near-duplicate board detection.
//!
//! Stricter per-word tolerance than ranking; used before creating something
//! new to ask "did you mean one of these existing boards?".

use super::normalize::{normalize, strip_board_prefix};
use super::scorer::{contains_either, matching_word_count, raw_words, NEAR_DUPLICATE_WORD_DISTANCE};
use super::similarity::within;
use crate::models::{EntityKind, NamedEntity, MAX_CANDIDATES};

/// Maximum whole-name edit distance for two boards to count as duplicates.
pub const NEAR_DUPLICATE_DISTANCE: usize = 2;
/// Minimum share of words that must match.
pub const WORD_OVERLAP_RATIO: f64 = 0.7;

/// Share of board words that have a match among the requested words, over
/// the larger of the two word counts. Zero when either side has no words.
/// A repeated requested word cannot inflate the share.
pub fn word_overlap(requested: &str, board_name: &str) -> f64 {
    let requested_words = raw_words(requested);
    let board_words = raw_words(board_name);
    let total = requested_words.len().max(board_words.len());
    if requested_words.is_empty() || board_words.is_empty() {
        return 0.0;
    }

    let matching = matching_word_count(&board_words, &requested_words, NEAR_DUPLICATE_WORD_DISTANCE);
    matching as f64 / total as f64
}

/// True when `board_name` is close enough to `requested` that creating
/// `requested` would likely duplicate it.
pub fn is_near_duplicate(requested: &str, board_name: &str) -> bool {
    let requested_compact = normalize(requested).compact();
    if requested_compact.is_empty() {
        return false;
    }

    let stripped = strip_board_prefix(board_name);
    let forms = [normalize(board_name).compact(), normalize(&stripped).compact()];

    let close = forms.iter().filter(|form| !form.is_empty()).any(|form| {
        within(&requested_compact, form, NEAR_DUPLICATE_DISTANCE)
            || contains_either(&requested_compact, form)
    });

    close || word_overlap(requested, &stripped) >= WORD_OVERLAP_RATIO
}

/// Boards that look like duplicates of `requested`, in discovery order,
/// at most [`MAX_CANDIDATES`].
pub fn find_near_duplicates(requested: &str, boards: &[NamedEntity]) -> Vec<NamedEntity> {
    boards
        .iter()
        .filter(|entity| entity.kind == EntityKind::Board)
        .filter(|board| is_near_duplicate(requested, &board.raw_name))
        .take(MAX_CANDIDATES)
        .cloned()
        .collect()
}
