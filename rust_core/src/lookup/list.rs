use tracing::{debug, info, warn};

use super::{Lookup, LookupOutcome};
use crate::directory::EntityDirectory;
use crate::disambiguation::{DisambiguationSession, ReplyChannel};
use crate::error::LookupError;
use crate::matching::{normalize, ResolveMode};
use crate::models::{EntityKind, NamedEntity, ResolutionResult};

/// Result of looking up a person's list on a board.
#[derive(Debug, Clone, PartialEq)]
pub struct ListResolution {
    pub outcome: LookupOutcome,
    /// The person's own list (or an alias of it) was missing and the
    /// default list was used instead.
    pub used_default_list: bool,
}

impl ListResolution {
    fn resolved(list: NamedEntity, used_default_list: bool) -> Self {
        Self {
            outcome: LookupOutcome::Resolved(list),
            used_default_list,
        }
    }

    fn unresolved(outcome: LookupOutcome) -> Self {
        Self {
            outcome,
            used_default_list: false,
        }
    }
}

impl<'a, D: EntityDirectory + ?Sized> Lookup<'a, D> {
    /// Find the list for `person` on a board.
    ///
    /// Tries the person's name and then each configured alias, matching list
    /// names exactly or after normalization. Falls back to the default list last.
    pub async fn list<C>(
        &self,
        board_id: &str,
        person: &str,
        requester_id: &str,
        channel: &mut C,
    ) -> Result<ListResolution, LookupError>
    where
        C: ReplyChannel + ?Sized,
    {
        let lists = self.directory.lists(board_id).await?;
        let policy = &self.settings.list_fallback;
        let requested_default = policy.is_default(person);

        let mut names = vec![person.trim().to_string()];
        names.extend(policy.alternates(person));

        for name in &names {
            if let Some(outcome) = self.list_by_name(name, &lists, requester_id, channel).await? {
                if let LookupOutcome::Resolved(list) = outcome {
                    let used_default = !requested_default && policy.is_default(&list.raw_name);
                    if name != &names[0] {
                        info!("List {:?} missing, using alias list {:?}", person, list.raw_name);
                    }
                    return Ok(ListResolution::resolved(list, used_default));
                }
                return Ok(ListResolution::unresolved(outcome));
            }
            debug!("No list matches {:?} on board {}", name, board_id);
        }

        let default = self
            .resolver(EntityKind::List)
            .resolve(&policy.default_list, &lists, ResolveMode::Exact);
        match default {
            ResolutionResult::Unique(list) => {
                warn!(
                    "List {:?} not found on board {}, using {:?}",
                    person, board_id, list.raw_name
                );
                Ok(ListResolution::resolved(list, !requested_default))
            }
            ResolutionResult::Ambiguous(mut lists) => {
                warn!("Board {} has {} default lists, using the first", board_id, lists.len());
                Ok(ListResolution::resolved(lists.remove(0), !requested_default))
            }
            ResolutionResult::NotFound => {
                warn!(
                    "Neither {:?} nor default list {:?} exist on board {}",
                    person, policy.default_list, board_id
                );
                Ok(ListResolution::unresolved(LookupOutcome::NotFound))
            }
        }
    }

    // None means "try the next name". Person lists only match by name:
    // exact, then equal once normalized. No distance-based ranking, so one
    // person's task never lands on a similarly named colleague's list.
    async fn list_by_name<C>(
        &self,
        name: &str,
        lists: &[NamedEntity],
        requester_id: &str,
        channel: &mut C,
    ) -> Result<Option<LookupOutcome>, LookupError>
    where
        C: ReplyChannel + ?Sized,
    {
        let resolver = self.resolver(EntityKind::List);

        let result = match resolver.resolve(name, lists, ResolveMode::Exact) {
            ResolutionResult::NotFound => ResolutionResult::from_matches(same_name(name, lists)),
            found => found,
        };

        match result {
            ResolutionResult::Unique(list) => Ok(Some(LookupOutcome::Resolved(list))),
            ResolutionResult::Ambiguous(candidates) => {
                let heading = format!(
                    "Several lists match \"{}\". Reply with the number of the right one:",
                    name
                );
                let session =
                    DisambiguationSession::new(candidates, requester_id, self.settings.board_window())
                        .with_heading(heading);
                Ok(Some(session.start(channel).await?.into()))
            }
            ResolutionResult::NotFound => Ok(None),
        }
    }
}

/// Lists whose normalized name equals the normalized `name`, so case,
/// accents and punctuation are ignored but nothing else is.
fn same_name(name: &str, lists: &[NamedEntity]) -> Vec<NamedEntity> {
    let wanted = normalize(name);
    if wanted.is_empty() {
        return Vec::new();
    }
    lists
        .iter()
        .filter(|list| list.kind == EntityKind::List && normalize(&list.raw_name) == wanted)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::disambiguation::MemoryChannel;
    use crate::lookup::LookupSettings;

    async fn resolve(directory: &StaticDirectory, person: &str) -> ListResolution {
        let settings = LookupSettings::default();
        let (mut channel, _handle) = MemoryChannel::new();
        Lookup::new(directory, &settings)
            .list("b1", person, "u1", &mut channel)
            .await
            .unwrap()
    }

    fn list_id(resolution: &ListResolution) -> Option<&str> {
        resolution.outcome.entity().map(|l| l.id.as_str())
    }

    #[tokio::test]
    async fn test_exact_list() {
        let directory = StaticDirectory::new()
            .with_list("b1", "l1", "bazowe")
            .with_list("b1", "l2", "Agnieszka");
        let resolution = resolve(&directory, "agnieszka").await;
        assert_eq!(list_id(&resolution), Some("l2"));
        assert!(!resolution.used_default_list);
    }

    #[tokio::test]
    async fn test_alias_list() {
        let directory = StaticDirectory::new()
            .with_list("b1", "l1", "Zrobione")
            .with_list("b1", "l2", "Aga");
        let resolution = resolve(&directory, "Agnieszka").await;
        assert_eq!(list_id(&resolution), Some("l2"));
        assert!(!resolution.used_default_list);
    }

    #[tokio::test]
    async fn test_falls_back_to_default() {
        let directory = StaticDirectory::new()
            .with_list("b1", "l1", "Bazowe")
            .with_list("b1", "l2", "Zrobione w tym tygodniu");
        let resolution = resolve(&directory, "Katarzyna").await;
        assert_eq!(list_id(&resolution), Some("l1"));
        assert!(resolution.used_default_list);
    }

    #[tokio::test]
    async fn test_requesting_default_is_not_a_fallback() {
        let directory = StaticDirectory::new().with_list("b1", "l1", "bazowe");
        let resolution = resolve(&directory, "bazowe").await;
        assert_eq!(list_id(&resolution), Some("l1"));
        assert!(!resolution.used_default_list);
    }

    #[tokio::test]
    async fn test_similar_colleague_list_is_not_used() {
        let directory = StaticDirectory::new()
            .with_list("b1", "l1", "Ola")
            .with_list("b1", "l2", "bazowe");
        let resolution = resolve(&directory, "Ela").await;
        assert_eq!(list_id(&resolution), Some("l2"));
        assert!(resolution.used_default_list);
    }

    #[tokio::test]
    async fn test_list_name_ignores_accents_and_punctuation() {
        let directory = StaticDirectory::new()
            .with_list("b1", "l1", "Łucja!")
            .with_list("b1", "l2", "bazowe");
        let resolution = resolve(&directory, "lucja").await;
        assert_eq!(list_id(&resolution), Some("l1"));
        assert!(!resolution.used_default_list);
    }

    #[tokio::test]
    async fn test_no_list_and_no_default() {
        let directory = StaticDirectory::new().with_list("b1", "l1", "Zrobione w tym tygodniu");
        let resolution = resolve(&directory, "Katarzyna").await;
        assert_eq!(resolution.outcome, LookupOutcome::NotFound);
    }
}
