//! Text canonicalization applied before any comparison.
//!
//! - Lowercasing
//! - Accent stripping (NFD decomposition, combining marks dropped, stroked
//!   letters such as `ł` folded to their base letter)
//! - Removal of everything that is not a letter, digit, `_` or whitespace
//! - Whitespace collapsing
//!
//! Board names additionally lose their `[TAG] 12 - ` prefix via
//! [`strip_board_prefix`]; list and member names never do.

use regex::Regex;
use std::sync::OnceLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Canonical form of a name or query. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedName {
    /// Words joined by single spaces.
    pub clean: String,
    pub words: Vec<String>,
}

impl NormalizedName {
    /// The clean form with all whitespace removed.
    pub fn compact(&self) -> String {
        self.words.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Normalize a name or query. Idempotent: `normalize(&normalize(x).clean) == normalize(x)`.
pub fn normalize(input: &str) -> NormalizedName {
    let folded: String = input
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .map(fold_stroked)
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();

    let words: Vec<String> = folded.split_whitespace().map(str::to_string).collect();

    NormalizedName {
        clean: words.join(" "),
        words,
    }
}

// Letters whose diacritic is part of the glyph and survives NFD.
fn fold_stroked(c: char) -> char {
    match c {
        'ł' => 'l',
        'đ' => 'd',
        'ø' => 'o',
        'ħ' => 'h',
        _ => c,
    }
}

fn board_prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // "[OZ] 1 - ", "[AG] 11 - ", "[[ITM]] ", "[[ C-Level ]] "
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*\[+[^\[\]]*\]+\s*(?:\d+\s*[-–]\s*)?")
            .expect("board prefix pattern is valid")
    })
}

/// Remove a leading bracket tag and optional ordinal from a board name.
///
/// `"[OZ] 1 - Franki Kancelaria"` becomes `"Franki Kancelaria"` and
/// `"[[ITM]] Admin"` becomes `"Admin"`. A name that is nothing but a prefix
/// is returned trimmed but otherwise unchanged.
pub fn strip_board_prefix(input: &str) -> String {
    let stripped = board_prefix_pattern().replace(input, "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        input.trim().to_string()
    } else {
        stripped.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_whitespace_insensitive() {
        assert_eq!(normalize("Beauty  Inn"), normalize("beauty inn"));
        assert_eq!(normalize("  Beauty\tInn \n").clean, "beauty inn");
    }

    #[test]
    fn test_accents_stripped() {
        assert_eq!(normalize("Łukasz Żółkiewski").clean, "lukasz zolkiewski");
        assert_eq!(normalize("Agnieszka Kowalczyk-Wąs").clean, "agnieszka kowalczykwas");
        assert_eq!(normalize("Café Crème").clean, "cafe creme");
    }

    #[test]
    fn test_punctuation_removed_not_spaced() {
        assert_eq!(normalize("Nowi / ITM").clean, "nowi itm");
        assert_eq!(normalize("Sp. z o.o.").clean, "sp z oo");
        assert_eq!(normalize("zzz_nonexistent_zzz").clean, "zzz_nonexistent_zzz");
    }

    #[test]
    fn test_idempotent() {
        for input in [
            "[OZ] 1 - Franki Kancelaria",
            "Łódź  Śródmieście!",
            "Przydzielone – Agnieszka",
            "İstanbul Ofis",
            "",
        ] {
            let once = normalize(input);
            let twice = normalize(&once.clean);
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_compact_and_empty() {
        let name = normalize("Franki Kancelaria");
        assert_eq!(name.compact(), "frankikancelaria");
        assert_eq!(name.words, vec!["franki", "kancelaria"]);
        assert!(normalize(" -- ").is_empty());
    }

    #[test]
    fn test_strip_board_prefix() {
        assert_eq!(strip_board_prefix("[OZ] 1 - Franki Kancelaria"), "Franki Kancelaria");
        assert_eq!(strip_board_prefix("[AG] 11 - Beauty Inn"), "Beauty Inn");
        assert_eq!(strip_board_prefix("[[ITM]] Admin"), "Admin");
        assert_eq!(strip_board_prefix("[[ ITM ]] Nowi / ITM"), "Nowi / ITM");
        assert_eq!(strip_board_prefix("  [AG]12-Beauty Inn"), "Beauty Inn");
    }

    #[test]
    fn test_strip_board_prefix_leaves_plain_names() {
        assert_eq!(strip_board_prefix("Beauty Inn"), "Beauty Inn");
        assert_eq!(strip_board_prefix("Plan 2024 [draft]"), "Plan 2024 [draft]");
        assert_eq!(strip_board_prefix("[OZ]"), "[OZ]");
    }
}
