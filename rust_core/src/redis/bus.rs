use anyhow::{Context, Result};
use redis::{aio::Connection, AsyncCommands, Client};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared publisher plus a factory for dedicated pub/sub connections.
#[derive(Clone)]
pub struct RedisBus {
    client: Client,
    connection: Arc<Mutex<Connection>>,
}

impl RedisBus {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).context("Invalid Redis URL")?;
        let connection = client
            .get_async_connection()
            .await
            .context("Failed to connect to Redis")?;

        Ok(Self {
            client,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    pub async fn publish<T: Serialize>(&self, channel: &str, message: &T) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        self.publish_str(channel, &payload).await
    }

    pub async fn publish_str(&self, channel: &str, message: &str) -> Result<()> {
        let mut conn = self.connection.lock().await;
        conn.publish::<_, _, ()>(channel, message)
            .await
            .with_context(|| format!("Failed to publish to {}", channel))?;
        Ok(())
    }

    /// A new pub/sub connection subscribed to `channel`. Each subscriber
    /// gets its own connection.
    pub async fn subscribe(&self, channel: &str) -> Result<redis::aio::PubSub> {
        let conn = self.client.get_async_connection().await?;
        let mut pubsub = conn.into_pubsub();
        pubsub
            .subscribe(channel)
            .await
            .with_context(|| format!("Failed to subscribe to {}", channel))?;
        Ok(pubsub)
    }
}
