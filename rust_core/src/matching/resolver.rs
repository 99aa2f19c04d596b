//! Exact-first, fuzzy-fallback resolution of a free-text name to one entity.

use tracing::debug;

use super::normalize::{normalize, strip_board_prefix};
use super::scorer::{score_detailed, RANKING_WORD_DISTANCE};
use crate::models::{EntityKind, NamedEntity, ResolutionResult, ScoredCandidate, MAX_CANDIDATES};

/// Default edit distance under which a fuzzy candidate is always kept.
pub const DEFAULT_MAX_DISTANCE: usize = 5;

/// Fuzzy candidates scoring above this are kept regardless of distance.
const KEEP_SCORE_ABOVE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Case-insensitive equality on the raw name (and, for boards, the
    /// prefix-stripped name). Boards fall through to fuzzy on zero matches.
    Exact,
    Fuzzy,
}

/// Resolves queries against entities of one kind. Pure and cheap to build;
/// entities of other kinds in the input are ignored.
#[derive(Debug, Clone)]
pub struct EntityResolver {
    kind: EntityKind,
    max_distance: usize,
}

impl EntityResolver {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }

    pub fn boards() -> Self {
        Self::new(EntityKind::Board)
    }

    pub fn lists() -> Self {
        Self::new(EntityKind::List)
    }

    pub fn members() -> Self {
        Self::new(EntityKind::Member)
    }

    pub fn with_max_distance(mut self, max_distance: usize) -> Self {
        self.max_distance = max_distance;
        self
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn resolve(
        &self,
        query: &str,
        entities: &[NamedEntity],
        mode: ResolveMode,
    ) -> ResolutionResult {
        if normalize(query).is_empty() {
            debug!("Empty {} query, nothing to resolve", self.kind);
            return ResolutionResult::NotFound;
        }

        match mode {
            ResolveMode::Exact => {
                let matches = self.exact_matches(query, entities);
                if matches.is_empty() && self.kind == EntityKind::Board {
                    debug!("No exact board match for {:?}, trying fuzzy", query);
                    return self.resolve_fuzzy(query, entities);
                }
                let result = ResolutionResult::from_matches(matches);
                debug!("Exact {} resolve {:?}: {}", self.kind, query, result.label());
                result
            }
            ResolveMode::Fuzzy => self.resolve_fuzzy(query, entities),
        }
    }

    /// All entities whose name equals the query ignoring case, in discovery order.
    pub fn exact_matches(&self, query: &str, entities: &[NamedEntity]) -> Vec<NamedEntity> {
        let query_lower = query.trim().to_lowercase();
        let query_stripped = self.matchable(query).to_lowercase();
        if query_lower.is_empty() {
            return Vec::new();
        }

        self.of_kind(entities)
            .filter(|entity| {
                let raw = entity.raw_name.trim().to_lowercase();
                if raw.is_empty() {
                    return false;
                }
                raw == query_lower
                    || (self.kind == EntityKind::Board
                        && strip_board_prefix(&entity.raw_name).to_lowercase() == query_stripped)
            })
            .cloned()
            .collect()
    }

    /// Score every entity, keep the plausible ones, best first, at most
    /// [`MAX_CANDIDATES`]. Ties keep discovery order.
    pub fn rank(&self, query: &str, entities: &[NamedEntity]) -> Vec<ScoredCandidate> {
        let query = self.matchable(query);
        if normalize(&query).is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredCandidate> = self
            .of_kind(entities)
            .filter_map(|entity| {
                let name = entity.match_name();
                if normalize(&name).is_empty() {
                    debug!("Skipping {} {} with empty name", self.kind, entity.id);
                    return None;
                }

                let breakdown = score_detailed(&query, &name, RANKING_WORD_DISTANCE);
                let keep = breakdown.score > KEEP_SCORE_ABOVE
                    || breakdown.distance <= self.max_distance
                    || breakdown.contains;
                if !keep {
                    return None;
                }

                Some(ScoredCandidate {
                    entity: entity.clone(),
                    distance: breakdown.distance,
                    score: breakdown.score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(MAX_CANDIDATES);
        scored
    }

    fn resolve_fuzzy(&self, query: &str, entities: &[NamedEntity]) -> ResolutionResult {
        let ranked = self.rank(query, entities);
        for candidate in &ranked {
            debug!(
                "Fuzzy {} candidate {:?}: score {:.1}, distance {}",
                self.kind, candidate.entity.raw_name, candidate.score, candidate.distance
            );
        }
        let result =
            ResolutionResult::from_matches(ranked.into_iter().map(|c| c.entity).collect());
        debug!("Fuzzy {} resolve {:?}: {}", self.kind, query, result.label());
        result
    }

    fn of_kind<'a>(
        &'a self,
        entities: &'a [NamedEntity],
    ) -> impl Iterator<Item = &'a NamedEntity> + 'a {
        entities.iter().filter(move |entity| entity.kind == self.kind)
    }

    fn matchable(&self, name: &str) -> String {
        match self.kind {
            EntityKind::Board => strip_board_prefix(name),
            EntityKind::List | EntityKind::Member => name.trim().to_string(),
        }
    }
}
