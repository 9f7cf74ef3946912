use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::{AvatarConfig, FALLBACK_AVATAR};
use crate::http_client::http_client;

const SEARCH_PATH: &str = "/v1/users/search";
const HEADSHOT_PATH: &str = "/v1/users/avatar-headshot";
const SEARCH_LIMIT: &str = "1";
const HEADSHOT_SIZE: &str = "150x150";
const HEADSHOT_FORMAT: &str = "Png";

/// Outcome of one stage of the avatar pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            Lookup::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(_))
    }
}

impl<T> From<Option<T>> for Lookup<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Lookup::Found(v),
            None => Lookup::NotFound,
        }
    }
}

/// The two outbound calls behind an avatar. `Err` covers transport failures,
/// bad statuses and malformed bodies; `Ok(NotFound)` means the service
/// answered but had nothing.
pub trait AvatarSource: Send + Sync + 'static {
    fn search_user_id(&self, username: &str) -> impl Future<Output = Result<Lookup<u64>>> + Send;

    fn headshot_url(&self, user_id: u64) -> impl Future<Output = Result<Lookup<String>>> + Send;
}

pub struct RobloxAvatarSource {
    client: Client,
    users_api: String,
    thumbnails_api: String,
    request_timeout: Duration,
}

impl RobloxAvatarSource {
    pub fn new(client: Client, config: &AvatarConfig) -> Self {
        Self {
            client,
            users_api: config.users_api.clone(),
            thumbnails_api: config.thumbnails_api.clone(),
            request_timeout: config.request_timeout,
        }
    }

    pub fn from_config(config: &AvatarConfig) -> Result<Self> {
        let client = http_client()?.clone();
        Ok(Self::new(client, config))
    }

    async fn get_text(&self, url: &str, query: &[(&str, &str)]) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await
            .context("request failed")?;
        let status = resp.status();
        let body = resp.text().await.context("failed reading body")?;
        if !status.is_success() {
            return Err(anyhow!("http {status}"));
        }
        Ok(body)
    }
}

impl AvatarSource for RobloxAvatarSource {
    async fn search_user_id(&self, username: &str) -> Result<Lookup<u64>> {
        let url = format!("{}{SEARCH_PATH}", self.users_api);
        let body = self
            .get_text(&url, &[("keyword", username), ("limit", SEARCH_LIMIT)])
            .await
            .context("user search request failed")?;
        parse_user_search_json(&body)
    }

    async fn headshot_url(&self, user_id: u64) -> Result<Lookup<String>> {
        let url = format!("{}{HEADSHOT_PATH}", self.thumbnails_api);
        let user_ids = user_id.to_string();
        let body = self
            .get_text(
                &url,
                &[
                    ("userIds", user_ids.as_str()),
                    ("size", HEADSHOT_SIZE),
                    ("format", HEADSHOT_FORMAT),
                    ("isCircular", "true"),
                ],
            )
            .await
            .context("headshot request failed")?;
        parse_headshot_json(&body)
    }
}

#[derive(Debug, Deserialize)]
struct UserSearchResponse {
    #[serde(default)]
    data: Option<Vec<UserSearchHit>>,
}

#[derive(Debug, Deserialize)]
struct UserSearchHit {
    #[serde(default)]
    id: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct HeadshotResponse {
    #[serde(default)]
    data: Option<Vec<HeadshotEntry>>,
}

#[derive(Debug, Deserialize)]
struct HeadshotEntry {
    #[serde(rename = "imageUrl", default)]
    image_url: Option<String>,
}

/// First search hit wins. An id of 0 is treated as missing.
pub fn parse_user_search_json(raw: &str) -> Result<Lookup<u64>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Lookup::NotFound);
    }
    let resp: UserSearchResponse =
        serde_json::from_str(trimmed).context("invalid user search json")?;
    let id = resp
        .data
        .and_then(|hits| hits.into_iter().next())
        .and_then(|hit| hit.id)
        .filter(|id| *id != 0);
    Ok(id.into())
}

pub fn parse_headshot_json(raw: &str) -> Result<Lookup<String>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Lookup::NotFound);
    }
    let resp: HeadshotResponse = serde_json::from_str(trimmed).context("invalid headshot json")?;
    let url = resp
        .data
        .and_then(|entries| entries.into_iter().next())
        .and_then(|entry| entry.image_url)
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty());
    Ok(url.into())
}

/// Turns a username into a display image URL. Never fails: every error path
/// ends at the fallback URL.
pub struct IdentityResolver<S> {
    source: S,
    fallback_url: String,
    call_timeout: Duration,
}

impl<S: AvatarSource> IdentityResolver<S> {
    pub fn new(source: S, config: &AvatarConfig) -> Self {
        Self::with_fallback(source, &config.fallback_url, config.request_timeout)
    }

    pub fn with_fallback(source: S, fallback_url: &str, call_timeout: Duration) -> Self {
        let fallback_url = if fallback_url.trim().is_empty() {
            FALLBACK_AVATAR.to_string()
        } else {
            fallback_url.to_string()
        };
        Self {
            source,
            fallback_url,
            call_timeout,
        }
    }

    pub fn fallback_url(&self) -> &str {
        &self.fallback_url
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Search then headshot. Stops after the search when it finds nobody.
    pub async fn lookup(&self, username: &str) -> Lookup<String> {
        if username.trim().is_empty() {
            return Lookup::NotFound;
        }
        let search = self.source.search_user_id(username);
        let Lookup::Found(user_id) = self.stage("user search", username, search).await else {
            return Lookup::NotFound;
        };
        let headshot = self.source.headshot_url(user_id);
        match self.stage("headshot", username, headshot).await {
            Lookup::Found(url) if !url.trim().is_empty() => Lookup::Found(url),
            _ => Lookup::NotFound,
        }
    }

    pub async fn resolve(&self, username: &str) -> String {
        match self.lookup(username).await {
            Lookup::Found(url) => url,
            Lookup::NotFound => self.fallback_url.clone(),
        }
    }

    async fn stage<T>(
        &self,
        stage: &'static str,
        username: &str,
        call: impl Future<Output = Result<Lookup<T>>>,
    ) -> Lookup<T> {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(found)) => found,
            Ok(Err(err)) => {
                debug!(username, stage, error = %format!("{err:#}"), "avatar stage failed");
                Lookup::NotFound
            }
            Err(_) => {
                debug!(username, stage, timeout = ?self.call_timeout, "avatar stage timed out");
                Lookup::NotFound
            }
        }
    }
}
