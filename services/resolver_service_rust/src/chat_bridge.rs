//! Reply channel over Redis.
//!
//! The chat gateway owns the chat platform connection. We publish
//! [`ChatCommand`]s on `chat:outbound` and read the users' replies from
//! `chat:inbound:{channel_id}`. Message handles we hand out are our own ids;
//! the gateway maps them to platform message ids.

use anyhow::Result;
use async_trait::async_trait;
use futures_util::{FutureExt, Stream, StreamExt};
use serde::Serialize;
use std::pin::Pin;
use tracing::{debug, warn};
use uuid::Uuid;

use taskbridge_core::disambiguation::{InboundEvent, MessageHandle, Prompt, ReplyChannel};
use taskbridge_core::error::ChannelError;
use taskbridge_core::models::channels;
use taskbridge_core::redis::RedisBus;

#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ChatCommand<'a> {
    Send {
        channel_id: &'a str,
        message_id: &'a str,
        prompt: &'a Prompt,
    },
    Edit {
        channel_id: &'a str,
        message_id: &'a str,
        prompt: &'a Prompt,
    },
    Delete {
        channel_id: &'a str,
        message_id: &'a str,
    },
}

type InboundStream = Pin<Box<dyn Stream<Item = redis::Msg> + Send + Sync>>;

pub struct RedisReplyChannel {
    bus: RedisBus,
    channel_id: String,
    inbound: InboundStream,
}

impl RedisReplyChannel {
    /// Subscribe to the channel's inbound events. Done before any prompt
    /// goes out so no reply can be missed.
    pub async fn open(bus: RedisBus, channel_id: &str) -> Result<Self> {
        let pubsub = bus.subscribe(&channels::chat_inbound(channel_id)).await?;
        debug!("Listening for chat events in {}", channel_id);
        Ok(Self {
            bus,
            channel_id: channel_id.to_string(),
            inbound: Box::pin(pubsub.into_on_message()),
        })
    }

    async fn publish(&self, command: &ChatCommand<'_>) -> Result<()> {
        self.bus.publish(channels::CHAT_OUTBOUND, command).await
    }
}

#[async_trait]
impl ReplyChannel for RedisReplyChannel {
    async fn send_prompt(&mut self, prompt: &Prompt) -> Result<MessageHandle, ChannelError> {
        let message_id = format!("tb-{}", Uuid::new_v4().simple());
        self.publish(&ChatCommand::Send {
            channel_id: &self.channel_id,
            message_id: &message_id,
            prompt,
        })
        .await
        .map_err(|e| ChannelError::Send(e.to_string()))?;
        Ok(MessageHandle(message_id))
    }

    async fn next_message(&mut self) -> Option<InboundEvent> {
        loop {
            let msg = self.inbound.next().await?;
            let payload: String = match msg.get_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("Unreadable chat event in {}: {}", self.channel_id, e);
                    continue;
                }
            };
            match serde_json::from_str::<InboundEvent>(&payload) {
                Ok(event) => return Some(event),
                Err(e) => warn!("Ignoring malformed chat event {:?}: {}", payload, e),
            }
        }
    }

    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while let Some(Some(_)) = self.inbound.next().now_or_never() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("Dropped {} stale chat events in {}", dropped, self.channel_id);
        }
        dropped
    }

    async fn edit_prompt(
        &mut self,
        handle: &MessageHandle,
        prompt: &Prompt,
    ) -> Result<(), ChannelError> {
        self.publish(&ChatCommand::Edit {
            channel_id: &self.channel_id,
            message_id: handle.as_str(),
            prompt,
        })
        .await
        .map_err(|e| ChannelError::Edit {
            message_id: handle.as_str().to_string(),
            reason: e.to_string(),
        })
    }

    async fn delete_message(&mut self, message_id: &str) -> Result<(), ChannelError> {
        self.publish(&ChatCommand::Delete {
            channel_id: &self.channel_id,
            message_id,
        })
        .await
        .map_err(|e| ChannelError::Delete {
            message_id: message_id.to_string(),
            reason: e.to_string(),
        })
    }
}
