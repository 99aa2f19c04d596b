use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use super::{Lookup, LookupOutcome};
use crate::directory::EntityDirectory;
use crate::disambiguation::{MemberMenuSession, ReplyChannel};
use crate::error::{DirectoryError, LookupError};
use crate::identity::IdentityMap;
use crate::matching::normalize;
use crate::models::NamedEntity;

fn list_owner_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"(?i)przydzielone?\s*[-–]\s*(.+)$",
            r"(?i)przypisane?\s*[-–]\s*(.+)$",
            r"(?i)^(.+)\s*[-–]\s*przydzielone?$",
            r"(?i)^(.+)\s*[-–]\s*przypisane?$",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("list owner pattern is valid"))
        .collect()
    })
}

/// Person a list belongs to: `"Przydzielone - Agnieszka"` and
/// `"Olga – Przypisane"` give the name; other list names come back unchanged.
pub fn parse_person_from_list_name(list_name: &str) -> String {
    list_owner_patterns()
        .iter()
        .find_map(|pattern| pattern.captures(list_name))
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|person| !person.is_empty())
        .unwrap_or_else(|| list_name.to_string())
}

/// Members whose normalized full name contains the normalized `name`.
pub fn members_named(name: &str, members: &[NamedEntity]) -> Vec<NamedEntity> {
    let needle = normalize(name).clean;
    if needle.is_empty() {
        return Vec::new();
    }
    members
        .iter()
        .filter(|member| normalize(&member.raw_name).clean.contains(&needle))
        .cloned()
        .collect()
}

impl<'a, D: EntityDirectory + ?Sized> Lookup<'a, D> {
    /// Board member for a chat username.
    ///
    /// An identity-map link wins. Otherwise `first.last` usernames are matched
    /// by first name, using the last name to break ties; without a tie-breaker
    /// the first candidate is taken.
    pub async fn member_for_chat_user(
        &self,
        chat_username: &str,
        identity: &IdentityMap,
    ) -> Result<Option<NamedEntity>, DirectoryError> {
        if let Some(board_username) = identity.get(chat_username) {
            match self.directory.member_by_username(board_username).await? {
                Some(member) => {
                    debug!("{} is linked to {}", chat_username, board_username);
                    return Ok(Some(member));
                }
                None => warn!(
                    "{} is linked to unknown board user {}, matching by name",
                    chat_username, board_username
                ),
            }
        }

        let mut parts = chat_username.trim().splitn(2, '.');
        let first_name = parts.next().unwrap_or_default();
        let last_name = parts.next().map(|s| normalize(s).clean).unwrap_or_default();
        if normalize(first_name).is_empty() {
            return Ok(None);
        }

        let members = self.directory.members().await?;
        let candidates = members_named(first_name, &members);
        let chosen = match candidates.len() {
            0 => None,
            1 => candidates.into_iter().next(),
            _ => {
                let by_last_name = if last_name.is_empty() {
                    None
                } else {
                    candidates
                        .iter()
                        .find(|m| normalize(&m.raw_name).clean.contains(&last_name))
                        .cloned()
                };
                if by_last_name.is_none() {
                    info!(
                        "{} members match {:?}, taking the first",
                        candidates.len(),
                        first_name
                    );
                }
                by_last_name.or_else(|| candidates.into_iter().next())
            }
        };

        match &chosen {
            Some(member) => debug!("{} matched member {:?}", chat_username, member.raw_name),
            None => debug!("No member matches {}", chat_username),
        }
        Ok(chosen)
    }

    /// Board member who owns a list. The default list has no owner. Several
    /// candidates are put to the requester as a menu.
    pub async fn member_for_list<C>(
        &self,
        list_name: &str,
        requester_id: &str,
        channel: &mut C,
    ) -> Result<LookupOutcome, LookupError>
    where
        C: ReplyChannel + ?Sized,
    {
        if list_name.trim().is_empty() || self.settings.list_fallback.is_default(list_name) {
            return Ok(LookupOutcome::NotFound);
        }

        let person = parse_person_from_list_name(list_name);
        let members = self.directory.members().await?;
        let candidates = members_named(&person, &members);
        if candidates.is_empty() {
            debug!("No member for list {:?}", list_name);
            return Ok(LookupOutcome::NotFound);
        }

        let session = MemberMenuSession::new(
            candidates,
            requester_id,
            list_name,
            self.settings.member_window(),
        );
        Ok(session.start(channel).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::StaticDirectory;
    use crate::disambiguation::MemoryChannel;
    use crate::lookup::LookupSettings;

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_member("m1", "Karolina Nowak", "karolinanowak")
            .with_member("m2", "Karolina Dobrzańska", "kdobrzanska")
            .with_member("m3", "Olga Wiśniewska", "olgaw")
            .with_member("m4", "Agnieszka Kowalczyk", "agakow")
    }

    #[test]
    fn test_parse_person_from_list_name() {
        assert_eq!(parse_person_from_list_name("Przydzielone - Agnieszka"), "Agnieszka");
        assert_eq!(parse_person_from_list_name("Przypisane – Olga"), "Olga");
        assert_eq!(parse_person_from_list_name("Agnieszka - Przydzielone"), "Agnieszka");
        assert_eq!(parse_person_from_list_name("Olga – Przypisane"), "Olga");
        assert_eq!(parse_person_from_list_name("przydzielon-Kasia"), "Kasia");
        assert_eq!(parse_person_from_list_name("bazowe"), "bazowe");
    }

    #[test]
    fn test_members_named_ignores_accents() {
        let members = vec![
            NamedEntity::member("m1", "Łucja Żak", "lucja"),
            NamedEntity::member("m2", "Olga Nowak", "olga"),
        ];
        let found = members_named("lucja", &members);
        assert_eq!(found.len(), 1);
        assert!(members_named("  ", &members).is_empty());
    }

    #[tokio::test]
    async fn test_identity_link_wins() {
        let directory = directory();
        let settings = LookupSettings::default();
        let mut identity = IdentityMap::new();
        identity.insert("karolina.nowak", "kdobrzanska");

        let member = Lookup::new(&directory, &settings)
            .member_for_chat_user("karolina.nowak", &identity)
            .await
            .unwrap();
        assert_eq!(member.map(|m| m.id), Some("m2".to_string()));
    }

    #[tokio::test]
    async fn test_last_name_breaks_tie() {
        let directory = directory();
        let settings = LookupSettings::default();
        let identity = IdentityMap::new();
        let lookup = Lookup::new(&directory, &settings);

        let member = lookup.member_for_chat_user("karolina.dobrzanska", &identity).await.unwrap();
        assert_eq!(member.map(|m| m.id), Some("m2".to_string()));

        let member = lookup.member_for_chat_user("karolina", &identity).await.unwrap();
        assert_eq!(member.map(|m| m.id), Some("m1".to_string()));

        let member = lookup.member_for_chat_user("olga.x", &identity).await.unwrap();
        assert_eq!(member.map(|m| m.id), Some("m3".to_string()));

        assert!(lookup.member_for_chat_user("zenon", &identity).await.unwrap().is_none());
        assert!(lookup.member_for_chat_user(".nowak", &identity).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stale_identity_link_falls_back_to_name() {
        let directory = directory();
        let settings = LookupSettings::default();
        let mut identity = IdentityMap::new();
        identity.insert("olga", "deleted_user");

        let member = Lookup::new(&directory, &settings)
            .member_for_chat_user("olga", &identity)
            .await
            .unwrap();
        assert_eq!(member.map(|m| m.id), Some("m3".to_string()));
    }

    #[tokio::test]
    async fn test_member_for_list_single_candidate() {
        let directory = directory();
        let settings = LookupSettings::default();
        let (mut channel, handle) = MemoryChannel::new();

        let outcome = Lookup::new(&directory, &settings)
            .member_for_list("Przydzielone - Agnieszka", "u1", &mut channel)
            .await
            .unwrap();
        assert_eq!(outcome.entity().map(|m| m.id.as_str()), Some("m4"));
        assert!(handle.outbound().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_member_for_list_menu() {
        let directory = directory();
        let settings = LookupSettings::default();
        let (mut channel, handle) = MemoryChannel::new();

        let lookup = Lookup::new(&directory, &settings);
        let task = async {
            lookup.member_for_list("Karolina", "u1", &mut channel).await
        };
        let picker = async {
            // Wait until the menu is on screen, then pick the second option.
            loop {
                if let Some(menu) = handle.sent_prompts().first().and_then(|p| p.menu.clone()) {
                    handle.choose(&menu.menu_id, "u1", &menu.options[1].value);
                    break;
                }
                tokio::task::yield_now().await;
            }
        };
        let (outcome, _) = tokio::join!(task, picker);
        assert_eq!(outcome.unwrap().entity().map(|m| m.id.as_str()), Some("m2"));
    }

    #[tokio::test]
    async fn test_default_list_has_no_owner() {
        let directory = directory();
        let settings = LookupSettings::default();
        let (mut channel, _handle) = MemoryChannel::new();

        let outcome = Lookup::new(&directory, &settings)
            .member_for_list("Bazowe", "u1", &mut channel)
            .await
            .unwrap();
        assert_eq!(outcome, LookupOutcome::NotFound);
        assert_eq!(directory.fetch_count(), 0);
    }
}
