//! Trello REST API Client
//!
//! Serves boards, lists and members of one organization as [`NamedEntity`]
//! values through the [`EntityDirectory`] trait.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::directory::EntityDirectory;
use crate::error::DirectoryError;
use crate::models::NamedEntity;

pub const DEFAULT_API_BASE: &str = "https://api.trello.com/1";

#[derive(Debug, Clone)]
pub struct TrelloCredentials {
    pub api_key: String,
    pub token: String,
    pub organization_id: String,
}

#[derive(Debug, Deserialize)]
struct TrelloBoard {
    id: String,
    name: String,
    #[serde(default)]
    closed: bool,
}

#[derive(Debug, Deserialize)]
struct TrelloList {
    id: String,
    name: String,
    #[serde(default)]
    closed: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TrelloMember {
    id: String,
    username: String,
    #[serde(default)]
    full_name: Option<String>,
}

impl From<TrelloMember> for NamedEntity {
    fn from(member: TrelloMember) -> Self {
        let full_name = member
            .full_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| member.username.clone());
        NamedEntity::member(member.id, full_name, member.username)
    }
}

pub struct TrelloClient {
    client: Client,
    base_url: String,
    credentials: TrelloCredentials,
}

impl TrelloClient {
    pub fn new(credentials: TrelloCredentials) -> Result<Self, DirectoryError> {
        Self::with_base_url(credentials, DEFAULT_API_BASE)
    }

    pub fn with_base_url(
        credentials: TrelloCredentials,
        base_url: &str,
    ) -> Result<Self, DirectoryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("TaskBridge/1.0")
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        })
    }

    /// GET `path` with auth and extra query pairs. `Ok(None)` on 404.
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Option<T>, DirectoryError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Fetching {} from Trello", path);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.credentials.api_key.as_str()),
                ("token", self.credentials.token.as_str()),
            ])
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Trello API error on {}: {} - {}", path, status, body);
            return Err(DirectoryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| DirectoryError::Decode(format!("{}: {}", path, e)))
    }

    async fn get_required<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, DirectoryError> {
        self.get_json(path, query)
            .await?
            .ok_or_else(|| DirectoryError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: format!("{} not found", path),
            })
    }
}

#[async_trait]
impl EntityDirectory for TrelloClient {
    async fn boards(&self) -> Result<Vec<NamedEntity>, DirectoryError> {
        let path = format!("/organizations/{}/boards", self.credentials.organization_id);
        let boards: Vec<TrelloBoard> = self
            .get_required(&path, &[("filter", "open"), ("fields", "name,closed")])
            .await?;

        Ok(boards
            .into_iter()
            .filter(|b| !b.closed)
            .map(|b| NamedEntity::board(b.id, b.name))
            .collect())
    }

    async fn lists(&self, board_id: &str) -> Result<Vec<NamedEntity>, DirectoryError> {
        let path = format!("/boards/{}/lists", board_id);
        let lists: Vec<TrelloList> = self
            .get_required(&path, &[("filter", "open"), ("fields", "name,closed")])
            .await?;

        Ok(lists
            .into_iter()
            .filter(|l| !l.closed)
            .map(|l| NamedEntity::list(l.id, l.name))
            .collect())
    }

    async fn members(&self) -> Result<Vec<NamedEntity>, DirectoryError> {
        let path = format!("/organizations/{}/members", self.credentials.organization_id);
        let members: Vec<TrelloMember> = self
            .get_required(&path, &[("fields", "fullName,username")])
            .await?;

        Ok(members.into_iter().map(NamedEntity::from).collect())
    }

    async fn member_by_username(
        &self,
        username: &str,
    ) -> Result<Option<NamedEntity>, DirectoryError> {
        let path = format!("/members/{}", username.trim().trim_start_matches('@'));
        let member: Option<TrelloMember> = self
            .get_json(&path, &[("fields", "fullName,username")])
            .await?;
        Ok(member.map(NamedEntity::from))
    }
}
