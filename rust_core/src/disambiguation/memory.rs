//! In-process reply channel for tests and local tooling.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::{InboundEvent, MessageHandle, Prompt, ReplyChannel};
use crate::error::ChannelError;

/// Everything the bot did on a [`MemoryChannel`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundRecord {
    Sent { handle: MessageHandle, prompt: Prompt },
    Edited { handle: MessageHandle, prompt: Prompt },
    Deleted { message_id: String },
}

pub struct MemoryChannel {
    inbound: mpsc::UnboundedReceiver<InboundEvent>,
    outbound: Arc<Mutex<Vec<OutboundRecord>>>,
    next_id: Arc<AtomicU64>,
    fail_deletes: bool,
}

/// The user's side of a [`MemoryChannel`]. Cheap to clone.
#[derive(Clone)]
pub struct MemoryChannelHandle {
    inbound: mpsc::UnboundedSender<InboundEvent>,
    outbound: Arc<Mutex<Vec<OutboundRecord>>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryChannel {
    pub fn new() -> (Self, MemoryChannelHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let outbound = Arc::new(Mutex::new(Vec::new()));
        let next_id = Arc::new(AtomicU64::new(1));

        let channel = Self {
            inbound: rx,
            outbound: outbound.clone(),
            next_id: next_id.clone(),
            fail_deletes: false,
        };
        let handle = MemoryChannelHandle {
            inbound: tx,
            outbound,
            next_id,
        };
        (channel, handle)
    }

    /// Make every `delete_message` fail, like a bot without delete permission.
    pub fn fail_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    fn allocate_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

#[async_trait]
impl ReplyChannel for MemoryChannel {
    async fn send_prompt(&mut self, prompt: &Prompt) -> Result<MessageHandle, ChannelError> {
        let handle = MessageHandle(self.allocate_id("bot"));
        self.outbound.lock().push(OutboundRecord::Sent {
            handle: handle.clone(),
            prompt: prompt.clone(),
        });
        Ok(handle)
    }

    async fn next_message(&mut self) -> Option<InboundEvent> {
        self.inbound.recv().await
    }

    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.inbound.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    async fn edit_prompt(
        &mut self,
        handle: &MessageHandle,
        prompt: &Prompt,
    ) -> Result<(), ChannelError> {
        self.outbound.lock().push(OutboundRecord::Edited {
            handle: handle.clone(),
            prompt: prompt.clone(),
        });
        Ok(())
    }

    async fn delete_message(&mut self, message_id: &str) -> Result<(), ChannelError> {
        if self.fail_deletes {
            return Err(ChannelError::Delete {
                message_id: message_id.to_string(),
                reason: "missing permission".to_string(),
            });
        }
        self.outbound.lock().push(OutboundRecord::Deleted {
            message_id: message_id.to_string(),
        });
        Ok(())
    }
}

impl MemoryChannelHandle {
    /// Queue a text message from `author_id`. Returns its message id.
    pub fn send_text(&self, author_id: &str, content: &str) -> String {
        let message_id = format!("user-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        // A dropped channel just means nobody is listening any more.
        let _ = self.inbound.send(InboundEvent::Text {
            message_id: message_id.clone(),
            author_id: author_id.to_string(),
            content: content.to_string(),
        });
        message_id
    }

    pub fn choose(&self, menu_id: &str, author_id: &str, value: &str) {
        let _ = self.inbound.send(InboundEvent::MenuChoice {
            menu_id: menu_id.to_string(),
            author_id: author_id.to_string(),
            value: value.to_string(),
        });
    }

    pub fn outbound(&self) -> Vec<OutboundRecord> {
        self.outbound.lock().clone()
    }

    /// Prompts sent (not edits), in order.
    pub fn sent_prompts(&self) -> Vec<Prompt> {
        self.outbound
            .lock()
            .iter()
            .filter_map(|record| match record {
                OutboundRecord::Sent { prompt, .. } => Some(prompt.clone()),
                _ => None,
            })
            .collect()
    }

    /// Latest text of every prompt, edits applied, in send order.
    pub fn transcript(&self) -> Vec<String> {
        let records = self.outbound.lock();
        let mut order: Vec<(MessageHandle, String)> = Vec::new();
        for record in records.iter() {
            match record {
                OutboundRecord::Sent { handle, prompt } => {
                    order.push((handle.clone(), prompt.text()));
                }
                OutboundRecord::Edited { handle, prompt } => {
                    if let Some(entry) = order.iter_mut().find(|(h, _)| h == handle) {
                        entry.1 = prompt.text();
                    }
                }
                OutboundRecord::Deleted { .. } => {}
            }
        }
        order.into_iter().map(|(_, text)| text).collect()
    }
}
