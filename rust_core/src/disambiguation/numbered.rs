//! Numbered-list selection: "reply with the number of your choice".

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::timeout_at;
use tracing::{debug, info, warn};

use super::{
    DisambiguationState, InboundEvent, MessageHandle, Prompt, PromptTone, ReplyChannel,
    SelectionOutcome,
};
use crate::error::ChannelError;
use crate::models::NamedEntity;

fn choice_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+)\.?$").expect("choice pattern is valid"))
}

/// Parse a reply like `"2"` or `"2."` into a 0-based index below `count`.
pub fn parse_choice(content: &str, count: usize) -> Option<usize> {
    let captures = choice_pattern().captures(content.trim())?;
    let number: usize = captures.get(1)?.as_str().parse().ok()?;
    if (1..=count).contains(&number) {
        Some(number - 1)
    } else {
        None
    }
}

pub struct DisambiguationSession {
    state: DisambiguationState,
    heading: String,
}

impl DisambiguationSession {
    pub fn new(candidates: Vec<NamedEntity>, requester_id: impl Into<String>, window: Duration) -> Self {
        Self {
            state: DisambiguationState::new(candidates, requester_id, window),
            heading: "Found several matches. Reply with the number of your choice:".to_string(),
        }
    }

    pub fn with_heading(mut self, heading: impl Into<String>) -> Self {
        self.heading = heading.into();
        self
    }

    pub fn state(&self) -> &DisambiguationState {
        &self.state
    }

    /// The prompt shown to the user: heading, then `1. name` per candidate.
    pub fn render(&self) -> Prompt {
        let mut lines = vec![self.heading.clone()];
        lines.extend(
            self.state
                .candidates
                .iter()
                .enumerate()
                .map(|(i, candidate)| format!("{}. {}", i + 1, candidate.raw_name)),
        );
        Prompt::new(PromptTone::Question, lines)
    }

    /// Prompt, then wait for the requester's numeric reply or the deadline.
    ///
    /// The window starts once the prompt is sent. Anything the user wrote
    /// before that is not an answer and is dropped. Replies from other users, non-numeric text and out-of-range numbers are
    /// ignored. Only a failure to send the prompt or a closed channel is an error.
    pub async fn start<C>(self, channel: &mut C) -> Result<SelectionOutcome, ChannelError>
    where
        C: ReplyChannel + ?Sized,
    {
        if self.state.candidates.is_empty() {
            return Ok(SelectionOutcome::Declined);
        }

        let prompt = self.render();
        let handle = channel.send_prompt(&prompt).await?;
        let deadline = self.state.deadline_from_now();
        let stale = channel.discard_pending();
        debug!(
            "Disambiguation {} waiting on {} for {} candidates ({} earlier events dropped)",
            self.state.session_id,
            self.state.requester_id,
            self.state.candidates.len(),
            stale
        );

        let waited = timeout_at(deadline, self.await_choice(channel)).await;
        match waited {
            Ok(Ok((index, message_id))) => {
                let chosen = self.state.candidates[index].clone();
                info!(
                    "Disambiguation {}: {} chose {:?}",
                    self.state.session_id, self.state.requester_id, chosen.raw_name
                );

                if let Err(e) = channel.delete_message(&message_id).await {
                    warn!("Could not delete selection reply {}: {}", message_id, e);
                }
                let confirmation =
                    Prompt::status(PromptTone::Success, format!("Selected: {}", chosen.raw_name));
                if let Err(e) = channel.send_prompt(&confirmation).await {
                    warn!("Could not send selection confirmation: {}", e);
                }

                Ok(SelectionOutcome::Selected(chosen))
            }
            Ok(Err(e)) => Err(e),
            Err(_) => {
                warn!(
                    "Disambiguation {} timed out waiting for {}",
                    self.state.session_id, self.state.requester_id
                );
                self.mark_timed_out(channel, &handle).await;
                Ok(SelectionOutcome::TimedOut)
            }
        }
    }

    async fn await_choice<C>(&self, channel: &mut C) -> Result<(usize, String), ChannelError>
    where
        C: ReplyChannel + ?Sized,
    {
        let count = self.state.candidates.len();
        loop {
            let event = channel.next_message().await.ok_or(ChannelError::Closed)?;
            let InboundEvent::Text {
                message_id,
                author_id,
                content,
            } = event
            else {
                continue;
            };
            if author_id != self.state.requester_id {
                continue;
            }
            match parse_choice(&content, count) {
                Some(index) => return Ok((index, message_id)),
                None => debug!("Ignoring reply {:?} for {} candidates", content, count),
            }
        }
    }

    async fn mark_timed_out<C>(&self, channel: &mut C, handle: &MessageHandle)
    where
        C: ReplyChannel + ?Sized,
    {
        let mut lines = self.render().lines;
        lines.push("Selection timed out. Run the command again.".to_string());
        let prompt = Prompt::new(PromptTone::Warning, lines);
        if let Err(e) = channel.edit_prompt(handle, &prompt).await {
            warn!("Could not mark prompt {} as timed out: {}", handle.as_str(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::disambiguation::{
        MemoryChannel, MemoryChannelHandle, OutboundRecord, BOARD_SELECTION_WINDOW,
    };
    use async_trait::async_trait;

    fn candidates() -> Vec<NamedEntity> {
        vec![
            NamedEntity::board("b1", "[AG] 11 - Beauty Inn"),
            NamedEntity::board("b2", "[AG] 12 - Beauty Inn"),
            NamedEntity::board("b3", "Beauty Inn Spa"),
        ]
    }

    /// Send `replies` as the user once the prompt is on screen.
    async fn answer(handle: &MemoryChannelHandle, replies: &[(&str, &str)]) {
        while handle.sent_prompts().is_empty() {
            tokio::task::yield_now().await;
        }
        for (author, content) in replies {
            handle.send_text(author, content);
        }
    }

    /// A transport whose sends take `delay` to go through.
    struct SlowChannel {
        inner: MemoryChannel,
        delay: Duration,
    }

    #[async_trait]
    impl ReplyChannel for SlowChannel {
        async fn send_prompt(&mut self, prompt: &Prompt) -> Result<MessageHandle, ChannelError> {
            tokio::time::sleep(self.delay).await;
            self.inner.send_prompt(prompt).await
        }

        async fn next_message(&mut self) -> Option<InboundEvent> {
            self.inner.next_message().await
        }

        fn discard_pending(&mut self) -> usize {
            self.inner.discard_pending()
        }

        async fn edit_prompt(
            &mut self,
            handle: &MessageHandle,
            prompt: &Prompt,
        ) -> Result<(), ChannelError> {
            self.inner.edit_prompt(handle, prompt).await
        }

        async fn delete_message(&mut self, message_id: &str) -> Result<(), ChannelError> {
            self.inner.delete_message(message_id).await
        }
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("2", 3), Some(1));
        assert_eq!(parse_choice(" 3. ", 3), Some(2));
        assert_eq!(parse_choice("0", 3), None);
        assert_eq!(parse_choice("7", 3), None);
        assert_eq!(parse_choice("2 please", 3), None);
        assert_eq!(parse_choice("-1", 3), None);
        assert_eq!(parse_choice("99999999999999999999999", 3), None);
    }

    #[test]
    fn test_render_is_one_indexed() {
        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);
        let prompt = session.render();
        assert_eq!(prompt.lines[1], "1. [AG] 11 - Beauty Inn");
        assert_eq!(prompt.lines[3], "3. Beauty Inn Spa");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_within_window_selects() {
        let (mut channel, handle) = MemoryChannel::new();
        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);

        let (outcome, _) = tokio::join!(session.start(&mut channel), answer(&handle, &[("u1", "2")]));
        assert_eq!(outcome.unwrap().entity_id(), Some("b2"));

        let outbound = handle.outbound();
        assert!(outbound.iter().any(|r| matches!(r, OutboundRecord::Deleted { .. })));
        assert_eq!(handle.sent_prompts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_reply_times_out() {
        let (mut channel, handle) = MemoryChannel::new();
        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);

        let late = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(31)).await;
            late.send_text("u1", "2");
        });

        let outcome = session.start(&mut channel).await.unwrap();
        assert_eq!(outcome, SelectionOutcome::TimedOut);
        assert!(handle
            .outbound()
            .iter()
            .any(|r| matches!(r, OutboundRecord::Edited { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_and_foreign_replies_ignored() {
        let (mut channel, handle) = MemoryChannel::new();
        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);
        let replies = [("u1", "7"), ("u1", "the second one"), ("u2", "1"), ("u1", "3.")];

        let (outcome, _) = tokio::join!(session.start(&mut channel), answer(&handle, &replies));
        assert_eq!(outcome.unwrap().entity_id(), Some("b3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_invalid_replies_times_out() {
        let (mut channel, handle) = MemoryChannel::new();
        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);

        let (outcome, _) = tokio::join!(session.start(&mut channel), answer(&handle, &[("u1", "7")]));
        assert_eq!(outcome.unwrap(), SelectionOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_sent_before_prompt_is_not_a_choice() {
        let (mut channel, handle) = MemoryChannel::new();
        // Typed while the bot was still resolving, e.g. "2" meant for an older list.
        handle.send_text("u1", "2");

        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);
        let outcome = session.start(&mut channel).await.unwrap();
        assert_eq!(outcome, SelectionOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_prompt_wins_over_earlier_message() {
        let (mut channel, handle) = MemoryChannel::new();
        handle.send_text("u1", "2");

        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);
        let (outcome, _) = tokio::join!(session.start(&mut channel), answer(&handle, &[("u1", "3")]));
        assert_eq!(outcome.unwrap().entity_id(), Some("b3"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_starts_when_prompt_is_sent() {
        let (inner, handle) = MemoryChannel::new();
        let mut channel = SlowChannel {
            inner,
            delay: Duration::from_secs(10),
        };
        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);

        // 35s after the session began, 25s after the prompt went out.
        let reply = async {
            tokio::time::sleep(Duration::from_secs(35)).await;
            handle.send_text("u1", "1");
        };
        let (outcome, _) = tokio::join!(session.start(&mut channel), reply);
        assert_eq!(outcome.unwrap().entity_id(), Some("b1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delete_still_selects() {
        let (channel, handle) = MemoryChannel::new();
        let mut channel = channel.fail_deletes();
        let session = DisambiguationSession::new(candidates(), "u1", BOARD_SELECTION_WINDOW);

        let (outcome, _) = tokio::join!(session.start(&mut channel), answer(&handle, &[("u1", "1")]));
        assert_eq!(outcome.unwrap().entity_id(), Some("b1"));
    }

    #[tokio::test]
    async fn test_no_candidates_declines_without_prompt() {
        let (mut channel, handle) = MemoryChannel::new();
        let session = DisambiguationSession::new(vec![], "u1", BOARD_SELECTION_WINDOW);
        assert_eq!(session.start(&mut channel).await.unwrap(), SelectionOutcome::Declined);
        assert!(handle.outbound().is_empty());
    }
}
