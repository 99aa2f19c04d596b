//! Member selection through a chat select menu.

use std::time::Duration;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use super::{
    DisambiguationState, InboundEvent, MenuOption, MessageHandle, Prompt, PromptTone,
    ReplyChannel, SelectMenu, SelectionOutcome,
};
use crate::error::ChannelError;
use crate::models::NamedEntity;

/// Menu value of the explicit "none of these" option.
pub const NONE_OF_THESE: &str = "none";

pub struct MemberMenuSession {
    state: DisambiguationState,
    menu_id: String,
    list_name: String,
}

impl MemberMenuSession {
    /// `list_name` is the list the member is being looked up for; it only
    /// appears in prompt text.
    pub fn new(
        candidates: Vec<NamedEntity>,
        requester_id: impl Into<String>,
        list_name: impl Into<String>,
        window: Duration,
    ) -> Self {
        let state = DisambiguationState::new(candidates, requester_id, window);
        Self {
            menu_id: format!("member_select_{}", state.session_id.simple()),
            state,
            list_name: list_name.into(),
        }
    }

    pub fn menu_id(&self) -> &str {
        &self.menu_id
    }

    pub fn render(&self) -> Prompt {
        let mut options: Vec<MenuOption> = self
            .state
            .candidates
            .iter()
            .map(|member| MenuOption {
                label: member.raw_name.clone(),
                description: member.username.as_ref().map(|u| format!("@{}", u)),
                value: member.id.clone(),
            })
            .collect();
        options.push(MenuOption {
            label: "None of these".to_string(),
            description: Some("Do not assign anyone from this list".to_string()),
            value: NONE_OF_THESE.to_string(),
        });

        Prompt::status(
            PromptTone::Question,
            format!(
                "Several members match list \"{}\". Pick the right one:",
                self.list_name
            ),
        )
        .with_title("Choose a member")
        .with_menu(SelectMenu {
            menu_id: self.menu_id.clone(),
            placeholder: "Select a member".to_string(),
            options,
        })
    }

    /// One candidate is returned without prompting, none is `Declined`.
    /// Only menu choices made after the prompt is sent count.
    pub async fn start<C>(self, channel: &mut C) -> Result<SelectionOutcome, ChannelError>
    where
        C: ReplyChannel + ?Sized,
    {
        match self.state.candidates.len() {
            0 => return Ok(SelectionOutcome::Declined),
            1 => return Ok(SelectionOutcome::Selected(self.state.candidates[0].clone())),
            _ => {}
        }

        let handle = channel.send_prompt(&self.render()).await?;
        let deadline = self.state.deadline_from_now();
        let stale = channel.discard_pending();
        debug!(
            "Member menu {} sent to {} with {} options ({} earlier events dropped)",
            self.menu_id,
            self.state.requester_id,
            self.state.candidates.len(),
            stale
        );

        let waited = timeout_at(deadline, self.await_choice(channel)).await;
        match waited {
            Ok(Ok(Some(member))) => {
                info!("Member menu {}: chose {:?}", self.menu_id, member.raw_name);
                let done = Prompt::status(
                    PromptTone::Success,
                    format!("Selected {} for list \"{}\"", member.raw_name, self.list_name),
                );
                self.edit_best_effort(channel, &handle, &done).await;
                Ok(SelectionOutcome::Selected(member))
            }
            Ok(Ok(None)) => {
                info!("Member menu {}: none of the candidates chosen", self.menu_id);
                let done = Prompt::status(
                    PromptTone::Info,
                    format!("No member assigned for list \"{}\"", self.list_name),
                );
                self.edit_best_effort(channel, &handle, &done).await;
                Ok(SelectionOutcome::Declined)
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!("Member menu {} timed out", self.menu_id);
                let done = Prompt::status(
                    PromptTone::Warning,
                    "Member selection timed out. Run the command again.",
                );
                self.edit_best_effort(channel, &handle, &done).await;
                Ok(SelectionOutcome::TimedOut)
            }
        }
    }

    // Some(member) for a pick, None for "none of these".
    async fn await_choice<C>(&self, channel: &mut C) -> Result<Option<NamedEntity>, ChannelError>
    where
        C: ReplyChannel + ?Sized,
    {
        loop {
            let event = channel.next_message().await.ok_or(ChannelError::Closed)?;
            let InboundEvent::MenuChoice {
                menu_id,
                author_id,
                value,
            } = event
            else {
                continue;
            };
            if menu_id != self.menu_id || author_id != self.state.requester_id {
                continue;
            }
            if value == NONE_OF_THESE {
                return Ok(None);
            }
            if let Some(member) = self.state.candidates.iter().find(|m| m.id == value) {
                return Ok(Some(member.clone()));
            }
            debug!("Ignoring unknown menu value {:?}", value);
        }
    }

    async fn edit_best_effort<C>(&self, channel: &mut C, handle: &MessageHandle, prompt: &Prompt)
    where
        C: ReplyChannel + ?Sized,
    {
        if let Err(e) = channel.edit_prompt(handle, prompt).await {
            warn!("Could not update member menu {}: {}", handle.as_str(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disambiguation::{MemoryChannel, MemoryChannelHandle, MEMBER_SELECTION_WINDOW};

    fn members() -> Vec<NamedEntity> {
        vec![
            NamedEntity::member("m1", "Agnieszka Nowak", "agnieszkanowak"),
            NamedEntity::member("m2", "Agnieszka Kowalska", "akowalska"),
        ]
    }

    fn session(candidates: Vec<NamedEntity>) -> MemberMenuSession {
        MemberMenuSession::new(candidates, "u1", "Przydzielone - Agnieszka", MEMBER_SELECTION_WINDOW)
    }

    async fn prompt_shown(handle: &MemoryChannelHandle) {
        while handle.sent_prompts().is_empty() {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_render_adds_none_option() {
        let prompt = session(members()).render();
        let menu = prompt.menu.unwrap();
        assert_eq!(menu.options.len(), 3);
        assert_eq!(menu.options[0].value, "m1");
        assert_eq!(menu.options[0].description.as_deref(), Some("@agnieszkanowak"));
        assert_eq!(menu.options[2].value, NONE_OF_THESE);
    }

    #[tokio::test]
    async fn test_single_candidate_skips_prompt() {
        let (mut channel, handle) = MemoryChannel::new();
        let outcome = session(members()[..1].to_vec()).start(&mut channel).await.unwrap();
        assert_eq!(outcome.entity_id(), Some("m1"));
        assert!(handle.outbound().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_choice_selects() {
        let (mut channel, handle) = MemoryChannel::new();
        let session = session(members());
        let menu_id = session.menu_id().to_string();

        let user = async {
            prompt_shown(&handle).await;
            handle.choose("other_menu", "u1", "m1");
            handle.choose(&menu_id, "u2", "m1");
            handle.send_text("u1", "2");
            handle.choose(&menu_id, "u1", "m2");
        };
        let (outcome, _) = tokio::join!(session.start(&mut channel), user);
        assert_eq!(outcome.unwrap().entity_id(), Some("m2"));
        assert!(handle.transcript()[0].starts_with("Selected Agnieszka Kowalska"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_of_these_declines() {
        let (mut channel, handle) = MemoryChannel::new();
        let session = session(members());
        let menu_id = session.menu_id().to_string();

        let user = async {
            prompt_shown(&handle).await;
            handle.choose(&menu_id, "u1", NONE_OF_THESE);
        };
        let (outcome, _) = tokio::join!(session.start(&mut channel), user);
        assert_eq!(outcome.unwrap(), SelectionOutcome::Declined);
    }

    #[tokio::test(start_paused = true)]
    async fn test_choice_queued_before_menu_is_dropped() {
        let (mut channel, handle) = MemoryChannel::new();
        let session = session(members());
        handle.choose(session.menu_id(), "u1", "m1");

        let outcome = session.start(&mut channel).await.unwrap();
        assert_eq!(outcome, SelectionOutcome::TimedOut);
        assert!(handle.transcript()[0].contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_menu_times_out() {
        let (mut channel, _handle) = MemoryChannel::new();
        let started = tokio::time::Instant::now();
        let outcome = session(members()).start(&mut channel).await.unwrap();
        assert_eq!(outcome, SelectionOutcome::TimedOut);
        assert!(started.elapsed() >= MEMBER_SELECTION_WINDOW);
    }
}
