use tracing::{debug, info};

use super::{Lookup, LookupOutcome};
use crate::directory::EntityDirectory;
use crate::disambiguation::{DisambiguationSession, ReplyChannel};
use crate::error::LookupError;
use crate::matching::{find_near_duplicates, ResolveMode};
use crate::models::{EntityKind, NamedEntity, ResolutionResult};

impl<'a, D: EntityDirectory + ?Sized> Lookup<'a, D> {
    /// Find the board the user means.
    ///
    /// Exact name first. With no exact match, near-duplicates are always
    /// confirmed by the user, even a single one. Only when there are none does
    /// the looser fuzzy ranking run.
    pub async fn board<C>(
        &self,
        query: &str,
        requester_id: &str,
        channel: &mut C,
    ) -> Result<LookupOutcome, LookupError>
    where
        C: ReplyChannel + ?Sized,
    {
        let boards = self.directory.boards().await?;
        let resolver = self.resolver(EntityKind::Board);

        let exact = ResolutionResult::from_matches(resolver.exact_matches(query, &boards));
        match exact {
            ResolutionResult::Unique(board) => {
                debug!("Board {:?} matched exactly: {}", query, board.id);
                return Ok(LookupOutcome::Resolved(board));
            }
            ResolutionResult::Ambiguous(candidates) => {
                info!("{} boards named {:?}, asking {}", candidates.len(), query, requester_id);
                let heading = format!(
                    "Several boards are named \"{}\". Reply with the number of the right one:",
                    query.trim()
                );
                return self.choose_board(candidates, heading, requester_id, channel).await;
            }
            ResolutionResult::NotFound => {}
        }

        let near = find_near_duplicates(query, &boards);
        if !near.is_empty() {
            info!("Board {:?} not found, {} similar boards", query, near.len());
            let heading = format!(
                "Board \"{}\" not found. Did you mean one of these? Reply with the number:",
                query.trim()
            );
            return self.choose_board(near, heading, requester_id, channel).await;
        }

        match resolver.resolve(query, &boards, ResolveMode::Fuzzy) {
            ResolutionResult::Unique(board) => {
                info!("Board {:?} fuzzy-matched {:?}", query, board.raw_name);
                Ok(LookupOutcome::Resolved(board))
            }
            ResolutionResult::Ambiguous(candidates) => {
                let heading = format!("Board \"{}\" not found. Similar boards:", query.trim());
                self.choose_board(candidates, heading, requester_id, channel).await
            }
            ResolutionResult::NotFound => {
                info!("No board resembles {:?}", query);
                Ok(LookupOutcome::NotFound)
            }
        }
    }

    async fn choose_board<C>(
        &self,
        candidates: Vec<NamedEntity>,
        heading: String,
        requester_id: &str,
        channel: &mut C,
    ) -> Result<LookupOutcome, LookupError>
    where
        C: ReplyChannel + ?Sized,
    {
        let session =
            DisambiguationSession::new(candidates, requester_id, self.settings.board_window())
                .with_heading(heading);
        Ok(session.start(channel).await?.into())
    }
}

#[cfg(test)]
mod tests {
    use crate::directory::StaticDirectory;
    use crate::disambiguation::{MemoryChannel, MemoryChannelHandle};
    use crate::lookup::{Lookup, LookupOutcome, LookupSettings};

    async fn reply_once_prompted(handle: &MemoryChannelHandle, content: &str) {
        while handle.sent_prompts().is_empty() {
            tokio::task::yield_now().await;
        }
        handle.send_text("u1", content);
    }

    fn directory() -> StaticDirectory {
        StaticDirectory::new()
            .with_board("b1", "[AG] 11 - Beauty Inn")
            .with_board("b2", "[AG] 12 - Beauty Inn")
            .with_board("b3", "[OZ] 1 - Franki Kancelaria")
            .with_board("b4", "Marketing Q3")
    }

    #[tokio::test]
    async fn test_exact_board_needs_no_prompt() {
        let directory = directory();
        let settings = LookupSettings::default();
        let (mut channel, handle) = MemoryChannel::new();

        let outcome = Lookup::new(&directory, &settings)
            .board("franki kancelaria", "u1", &mut channel)
            .await
            .unwrap();
        assert_eq!(outcome.entity().map(|b| b.id.as_str()), Some("b3"));
        assert!(handle.outbound().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_names_prompt() {
        let directory = directory();
        let settings = LookupSettings::default();
        let (mut channel, handle) = MemoryChannel::new();
        let lookup = Lookup::new(&directory, &settings);

        let (outcome, _) = tokio::join!(
            lookup.board("Beauty Inn", "u1", &mut channel),
            reply_once_prompted(&handle, "2")
        );
        assert_eq!(outcome.unwrap().entity().map(|b| b.id.as_str()), Some("b2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_near_duplicate_is_confirmed() {
        let directory = directory();
        let settings = LookupSettings::default();
        let (mut channel, handle) = MemoryChannel::new();
        let lookup = Lookup::new(&directory, &settings);

        let (outcome, _) = tokio::join!(
            lookup.board("Franki Kancelari", "u1", &mut channel),
            reply_once_prompted(&handle, "1")
        );
        assert_eq!(outcome.unwrap().entity().map(|b| b.id.as_str()), Some("b3"));

        let prompt = &handle.sent_prompts()[0];
        assert!(prompt.lines[0].contains("Did you mean"));
        assert_eq!(prompt.lines.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_near_duplicate_times_out() {
        let directory = directory();
        let settings = LookupSettings::default();
        let (mut channel, _handle) = MemoryChannel::new();

        let outcome = Lookup::new(&directory, &settings)
            .board("Franki Kancelari", "u1", &mut channel)
            .await
            .unwrap();
        assert_eq!(outcome, LookupOutcome::TimedOut);
    }

    #[tokio::test]
    async fn test_unknown_board_not_found() {
        let directory = directory();
        let settings = LookupSettings::default();
        let (mut channel, handle) = MemoryChannel::new();

        let outcome = Lookup::new(&directory, &settings)
            .board("zzz_nonexistent_zzz", "u1", &mut channel)
            .await
            .unwrap();
        assert_eq!(outcome, LookupOutcome::NotFound);
        assert!(handle.outbound().is_empty());
    }

    #[tokio::test]
    async fn test_directory_failure_propagates() {
        let directory = directory();
        directory.fail_with("Trello unavailable");
        let settings = LookupSettings::default();
        let (mut channel, _handle) = MemoryChannel::new();

        let result = Lookup::new(&directory, &settings)
            .board("Beauty Inn", "u1", &mut channel)
            .await;
        assert!(matches!(result, Err(crate::error::LookupError::Directory(_))));
    }
}
