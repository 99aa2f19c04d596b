mod chat_bridge;
mod config;
mod handler;

use anyhow::{Context, Result};
use dotenv::dotenv;
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::handler::ResolverContext;
use taskbridge_core::clients::TrelloClient;
use taskbridge_core::directory::CachedDirectory;
use taskbridge_core::identity::IdentityMap;
use taskbridge_core::models::{channels, LinkRequest, ResolveRequest};
use taskbridge_core::redis::RedisBus;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    info!("Starting Resolver Service...");

    let config = Config::from_env().context("Invalid configuration")?;

    let bus = RedisBus::new(&config.redis_url).await?;

    let trello = TrelloClient::with_base_url(config.trello.clone(), &config.trello_api_base)
        .context("Failed to create Trello client")?;
    let directory = CachedDirectory::new(trello, config.directory_cache_ttl);

    let identity = IdentityMap::load(&config.identity_map_path).with_context(|| {
        format!(
            "Failed to load identity map from {}",
            config.identity_map_path.display()
        )
    })?;
    info!("{} identity links loaded", identity.len());

    let context = Arc::new(ResolverContext {
        bus: bus.clone(),
        directory: Arc::new(directory),
        settings: config.lookup_settings(),
        identity: RwLock::new(identity),
        identity_path: config.identity_map_path.clone(),
    });

    let mut tasks = Vec::new();

    // 1. Resolve requests
    let ctx = context.clone();
    let bus_clone = bus.clone();
    tasks.push(tokio::spawn(async move {
        listen(bus_clone, channels::RESOLVE_REQUESTS, move |request: ResolveRequest| {
            let ctx = ctx.clone();
            async move {
                let channel = channels::resolve_response(&request.request_id);
                let response = ctx.handle_resolve(request).await;
                if let Err(e) = ctx.bus.publish(&channel, &response).await {
                    error!("Failed to publish resolve response: {}", e);
                }
            }
        })
        .await;
    }));

    // 2. Identity link requests
    let ctx = context.clone();
    let bus_clone = bus.clone();
    tasks.push(tokio::spawn(async move {
        listen(bus_clone, channels::IDENTITY_LINK_REQUESTS, move |request: LinkRequest| {
            let ctx = ctx.clone();
            async move {
                let channel = channels::link_response(&request.request_id);
                let response = ctx.handle_link(request).await;
                if let Err(e) = ctx.bus.publish(&channel, &response).await {
                    error!("Failed to publish link response: {}", e);
                }
            }
        })
        .await;
    }));

    info!("Resolver Service running");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        _ = futures_util::future::join_all(tasks) => {
            error!("Listener tasks exited unexpectedly");
        }
    }

    Ok(())
}

/// Subscribe to `channel` and run `handle` in its own task for every
/// request. Resubscribes after 5s when the connection drops.
async fn listen<T, F, Fut>(bus: RedisBus, channel: &'static str, handle: F)
where
    T: DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        match bus.subscribe(channel).await {
            Ok(pubsub) => {
                info!("Listening on {}", channel);
                let mut stream = pubsub.into_on_message();
                while let Some(msg) = stream.next().await {
                    let payload: String = match msg.get_payload() {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Unreadable message on {}: {}", channel, e);
                            continue;
                        }
                    };
                    match serde_json::from_str::<T>(&payload) {
                        Ok(request) => {
                            tokio::spawn(handle(request));
                        }
                        Err(e) => warn!("Ignoring malformed request on {}: {}", channel, e),
                    }
                }
                warn!("Subscription to {} ended, reconnecting", channel);
            }
            Err(e) => {
                error!("Failed to subscribe to {}: {:#}", channel, e);
            }
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}
