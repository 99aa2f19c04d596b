//! Lookup Flows
//!
//! Caller-level policies built on the resolver, the directory and the
//! disambiguation sessions:
//! - `board`: exact, then "did you mean" near-duplicates, then fuzzy
//! - `list`: exact or normalized-equal name, alias retry, default list
//! - `member`: identity map and name matching for chat users and list owners
//! - `task`: everything a new task needs in one [`TaskTarget`]
//!
//! [`TaskTarget`]: crate::models::TaskTarget

use std::time::Duration;

use crate::directory::EntityDirectory;
use crate::disambiguation::{SelectionOutcome, SelectionSettings};
use crate::matching::{normalize, EntityResolver, DEFAULT_MAX_DISTANCE};
use crate::models::{EntityKind, NamedEntity};

pub mod board;
pub mod list;
pub mod member;
pub mod task;

pub use list::ListResolution;
pub use member::parse_person_from_list_name;
pub use task::{TaskRequest, TaskTargetResult};

pub const DEFAULT_LIST_NAME: &str = "bazowe";

/// Final answer of an interactive lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    Resolved(NamedEntity),
    NotFound,
    TimedOut,
    Declined,
}

impl LookupOutcome {
    pub fn entity(&self) -> Option<&NamedEntity> {
        match self {
            LookupOutcome::Resolved(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LookupOutcome::Resolved(_) => "resolved",
            LookupOutcome::NotFound => "not_found",
            LookupOutcome::TimedOut => "timed_out",
            LookupOutcome::Declined => "declined",
        }
    }
}

impl From<SelectionOutcome> for LookupOutcome {
    fn from(outcome: SelectionOutcome) -> Self {
        match outcome {
            SelectionOutcome::Selected(entity) => LookupOutcome::Resolved(entity),
            SelectionOutcome::Declined => LookupOutcome::Declined,
            SelectionOutcome::TimedOut => LookupOutcome::TimedOut,
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Which list a task lands on when the person's own list is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFallbackPolicy {
    pub default_list: String,
    /// Names that refer to the same person, e.g. `["Agnieszka", "Aga"]`.
    pub alias_groups: Vec<Vec<String>>,
}

impl Default for ListFallbackPolicy {
    fn default() -> Self {
        Self {
            default_list: DEFAULT_LIST_NAME.to_string(),
            alias_groups: vec![vec!["Agnieszka".to_string(), "Aga".to_string()]],
        }
    }
}

impl ListFallbackPolicy {
    /// Parse `"Agnieszka|Aga;Katarzyna|Kasia"`. Groups with fewer than two
    /// names are dropped.
    pub fn parse_alias_groups(raw: &str) -> Vec<Vec<String>> {
        raw.split(';')
            .map(|group| {
                group
                    .split('|')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .filter(|group| group.len() > 1)
            .collect()
    }

    /// Other names for `person`, in configured order, without `person` itself.
    pub fn alternates(&self, person: &str) -> Vec<String> {
        let person = normalize(person).clean;
        if person.is_empty() {
            return Vec::new();
        }
        let mut alternates: Vec<String> = Vec::new();
        for group in &self.alias_groups {
            if !group.iter().any(|name| normalize(name).clean == person) {
                continue;
            }
            for name in group {
                if normalize(name).clean != person && !alternates.contains(name) {
                    alternates.push(name.clone());
                }
            }
        }
        alternates
    }

    pub fn is_default(&self, list_name: &str) -> bool {
        list_name.trim().eq_ignore_ascii_case(self.default_list.trim())
    }
}

#[derive(Debug, Clone)]
pub struct LookupSettings {
    pub selection: SelectionSettings,
    pub list_fallback: ListFallbackPolicy,
    pub max_distance: usize,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            selection: SelectionSettings::default(),
            list_fallback: ListFallbackPolicy::default(),
            max_distance: DEFAULT_MAX_DISTANCE,
        }
    }
}

impl LookupSettings {
    pub fn board_window(&self) -> Duration {
        self.selection.board_window
    }

    pub fn member_window(&self) -> Duration {
        self.selection.member_window
    }
}

// ============================================================================
// Lookup
// ============================================================================

/// Runs lookup flows for one command against one directory.
pub struct Lookup<'a, D: ?Sized> {
    directory: &'a D,
    settings: &'a LookupSettings,
}

impl<'a, D: EntityDirectory + ?Sized> Lookup<'a, D> {
    pub fn new(directory: &'a D, settings: &'a LookupSettings) -> Self {
        Self {
            directory,
            settings,
        }
    }

    pub fn settings(&self) -> &LookupSettings {
        self.settings
    }

    fn resolver(&self, kind: EntityKind) -> EntityResolver {
        EntityResolver::new(kind).with_max_distance(self.settings.max_distance)
    }
}
