use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use taskbridge_core::clients::trello::DEFAULT_API_BASE;
use taskbridge_core::clients::TrelloCredentials;
use taskbridge_core::disambiguation::SelectionSettings;
use taskbridge_core::lookup::{ListFallbackPolicy, LookupSettings, DEFAULT_LIST_NAME};
use taskbridge_core::matching::DEFAULT_MAX_DISTANCE;

#[derive(Debug, Clone)]
pub struct Config {
    pub redis_url: String,

    pub trello_api_base: String,
    pub trello: TrelloCredentials,
    pub directory_cache_ttl: Duration,

    pub identity_map_path: PathBuf,

    pub default_list_name: String,
    pub list_aliases: Vec<Vec<String>>,

    pub board_selection_timeout: Duration,
    pub member_selection_timeout: Duration,
    pub fuzzy_max_distance: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let trello_api_base =
            env::var("TRELLO_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        let trello = TrelloCredentials {
            api_key: required_env("TRELLO_KEY")?,
            token: required_env("TRELLO_TOKEN")?,
            organization_id: required_env("TRELLO_ORGANIZATION_ID")?,
        };
        let directory_cache_ttl = Duration::from_secs(
            parse_u64_env("DIRECTORY_CACHE_TTL_SECS", 300).context("DIRECTORY_CACHE_TTL_SECS")?,
        );

        let identity_map_path = PathBuf::from(
            env::var("IDENTITY_MAP_PATH").unwrap_or_else(|_| "data/identity_map.json".to_string()),
        );

        let default_list_name =
            env::var("DEFAULT_LIST_NAME").unwrap_or_else(|_| DEFAULT_LIST_NAME.to_string());
        let list_aliases = ListFallbackPolicy::parse_alias_groups(
            &env::var("LIST_ALIASES").unwrap_or_else(|_| "Agnieszka|Aga".to_string()),
        );

        let board_selection_timeout = Duration::from_secs(
            parse_u64_env("BOARD_SELECTION_TIMEOUT_SECS", 30)
                .context("BOARD_SELECTION_TIMEOUT_SECS")?,
        );
        let member_selection_timeout = Duration::from_secs(
            parse_u64_env("MEMBER_SELECTION_TIMEOUT_SECS", 60)
                .context("MEMBER_SELECTION_TIMEOUT_SECS")?,
        );
        let fuzzy_max_distance = parse_u64_env("FUZZY_MAX_DISTANCE", DEFAULT_MAX_DISTANCE as u64)
            .context("FUZZY_MAX_DISTANCE")? as usize;

        Ok(Self {
            redis_url,
            trello_api_base,
            trello,
            directory_cache_ttl,
            identity_map_path,
            default_list_name,
            list_aliases,
            board_selection_timeout,
            member_selection_timeout,
            fuzzy_max_distance,
        })
    }

    pub fn lookup_settings(&self) -> LookupSettings {
        LookupSettings {
            selection: SelectionSettings {
                board_window: self.board_selection_timeout,
                member_window: self.member_selection_timeout,
            },
            list_fallback: ListFallbackPolicy {
                default_list: self.default_list_name.clone(),
                alias_groups: self.list_aliases.clone(),
            },
            max_distance: self.fuzzy_max_distance,
        }
    }
}

fn required_env(key: &str) -> Result<String> {
    let value = env::var(key).with_context(|| format!("{key} must be set"))?;
    if value.trim().is_empty() {
        return Err(anyhow!("{key} must not be empty"));
    }
    Ok(value)
}

fn parse_u64_env(key: &str, default: u64) -> Result<u64> {
    let raw = env::var(key).unwrap_or_else(|_| default.to_string());
    parse_u64(key, &raw)
}

fn parse_u64(key: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .with_context(|| format!("Invalid {key}: {raw} (expected non-negative integer)"))
}
