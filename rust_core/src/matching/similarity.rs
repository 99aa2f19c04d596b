//! Edit distance between short names.
//!
//! Callers bound input length; board, list and member names are short.

use strsim::levenshtein;

/// Levenshtein distance (insert, delete, substitute each cost 1) after case
/// folding both inputs. Counts chars, so `distance("", b)` is the char length of `b`.
pub fn distance(a: &str, b: &str) -> usize {
    levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// True when `a` and `b` are at most `max` edits apart.
pub fn within(a: &str, b: &str, max: usize) -> bool {
    distance(a, b) <= max
}
