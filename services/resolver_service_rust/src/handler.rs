use anyhow::{anyhow, Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use taskbridge_core::directory::EntityDirectory;
use taskbridge_core::identity::IdentityMap;
use taskbridge_core::lookup::{
    Lookup, LookupOutcome, LookupSettings, TaskRequest, TaskTargetResult,
};
use taskbridge_core::models::{
    LinkRequest, LinkResponse, ResolveKind, ResolveRequest, ResolveResponse, ResolveStatus,
};
use taskbridge_core::redis::RedisBus;

use crate::chat_bridge::RedisReplyChannel;

/// Everything a request handler needs. Shared by all request tasks.
pub struct ResolverContext {
    pub bus: RedisBus,
    pub directory: Arc<dyn EntityDirectory>,
    pub settings: LookupSettings,
    pub identity: RwLock<IdentityMap>,
    pub identity_path: PathBuf,
}

pub fn status_for(outcome: &LookupOutcome) -> ResolveStatus {
    match outcome {
        LookupOutcome::Resolved(_) => ResolveStatus::Resolved,
        LookupOutcome::NotFound => ResolveStatus::NotFound,
        LookupOutcome::TimedOut => ResolveStatus::TimedOut,
        LookupOutcome::Declined => ResolveStatus::Declined,
    }
}

fn response_for(request_id: &str, outcome: LookupOutcome) -> ResolveResponse {
    let mut response = ResolveResponse::new(request_id, status_for(&outcome));
    if let LookupOutcome::Resolved(entity) = outcome {
        response.entity = Some(entity);
    }
    response
}

impl ResolverContext {
    /// Resolve one request. Failures become a `failed` response.
    pub async fn handle_resolve(&self, request: ResolveRequest) -> ResolveResponse {
        let request_id = request.request_id.clone();
        match self.resolve(request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Resolve request {} failed: {:#}", request_id, e);
                ResolveResponse::failed(request_id, format!("{:#}", e))
            }
        }
    }

    async fn resolve(&self, request: ResolveRequest) -> Result<ResolveResponse> {
        let lookup = Lookup::new(self.directory.as_ref(), &self.settings);
        info!(
            "Resolving {:?} {:?} for {} ({})",
            request.kind, request.query, request.requester_id, request.request_id
        );

        let response = match request.kind {
            ResolveKind::Board => {
                let mut channel = self.open_channel(&request.channel_id).await?;
                let outcome = lookup
                    .board(&request.query, &request.requester_id, &mut channel)
                    .await?;
                response_for(&request.request_id, outcome)
            }
            ResolveKind::List => {
                let board_id = request
                    .board_id
                    .as_deref()
                    .ok_or_else(|| anyhow!("board_id is required for list lookups"))?;
                let mut channel = self.open_channel(&request.channel_id).await?;
                let resolution = lookup
                    .list(board_id, &request.query, &request.requester_id, &mut channel)
                    .await?;
                if resolution.used_default_list {
                    info!("Request {} fell back to the default list", request.request_id);
                }
                response_for(&request.request_id, resolution.outcome)
            }
            ResolveKind::Member => {
                let identity = self.identity.read().await.clone();
                let outcome = match lookup.member_for_chat_user(&request.query, &identity).await? {
                    Some(member) => LookupOutcome::Resolved(member),
                    None => LookupOutcome::NotFound,
                };
                response_for(&request.request_id, outcome)
            }
            ResolveKind::Task => {
                let identity = self.identity.read().await.clone();
                let task = TaskRequest {
                    requester_id: request.requester_id.clone(),
                    requester_username: request.requester_username.clone(),
                    board_query: request.query.clone(),
                    person: request.person.clone(),
                    mentioned_usernames: request.mentioned_usernames.clone(),
                };
                let mut channel = self.open_channel(&request.channel_id).await?;
                match lookup.task_target(&task, &identity, &mut channel).await? {
                    TaskTargetResult::Ready(target) => {
                        let mut response =
                            ResolveResponse::new(&request.request_id, ResolveStatus::Resolved);
                        response.target = Some(target);
                        response
                    }
                    TaskTargetResult::BoardUnresolved(outcome) => {
                        response_for(&request.request_id, outcome)
                    }
                    TaskTargetResult::ListUnresolved { board, outcome } => {
                        let mut response = response_for(&request.request_id, outcome);
                        response.error = Some(format!(
                            "No usable list on board \"{}\"",
                            board.raw_name
                        ));
                        response
                    }
                }
            }
        };

        info!(
            "Request {} finished: {:?}",
            response.request_id, response.status
        );
        Ok(response)
    }

    /// Link a chat user to a board user after checking the board user exists.
    pub async fn handle_link(&self, request: LinkRequest) -> LinkResponse {
        let mut response = LinkResponse {
            request_id: request.request_id.clone(),
            linked: false,
            member: None,
            error: None,
        };

        let member = match self.directory.member_by_username(&request.board_username).await {
            Ok(Some(member)) => member,
            Ok(None) => {
                response.error = Some(format!(
                    "Board user \"{}\" does not exist",
                    request.board_username
                ));
                return response;
            }
            Err(e) => {
                error!("Link request {} failed: {}", request.request_id, e);
                response.error = Some(e.to_string());
                return response;
            }
        };

        let board_username = member
            .username
            .clone()
            .unwrap_or_else(|| request.board_username.clone());
        {
            let mut identity = self.identity.write().await;
            if let Some(previous) = identity.insert(&request.chat_username, &board_username) {
                info!(
                    "Relinked {} from {} to {}",
                    request.chat_username, previous, board_username
                );
            } else {
                info!("Linked {} to {}", request.chat_username, board_username);
            }
            if let Err(e) = identity.save(&self.identity_path) {
                warn!("Identity map not saved to {}: {}", self.identity_path.display(), e);
                response.error = Some(format!("Linked, but not saved: {}", e));
            }
        }

        response.linked = true;
        response.member = Some(member);
        response
    }

    async fn open_channel(&self, channel_id: &str) -> Result<RedisReplyChannel> {
        RedisReplyChannel::open(self.bus.clone(), channel_id)
            .await
            .with_context(|| format!("Failed to open chat channel {}", channel_id))
    }
}
