//! Name Matching
//!
//! Pure, synchronous matching of free-text names against board, list and
//! member names:
//! - `normalize`: canonical form used by every comparison
//! - `similarity`: case-folded edit distance
//! - `scorer`: composite score for ranking fuzzy candidates
//! - `resolver`: exact-first, fuzzy-fallback resolution to a `ResolutionResult`
//! - `near_duplicate`: "did you mean this existing board?" detection

pub mod near_duplicate;
pub mod normalize;
pub mod resolver;
pub mod scorer;
pub mod similarity;

pub use near_duplicate::{find_near_duplicates, is_near_duplicate};
pub use normalize::{normalize, strip_board_prefix, NormalizedName};
pub use resolver::{EntityResolver, ResolveMode, DEFAULT_MAX_DISTANCE};
pub use scorer::{score, score_detailed, ScoreBreakdown};
pub use similarity::distance;
