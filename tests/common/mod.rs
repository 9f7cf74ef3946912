#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};

use iff_roster::avatar_cache::AvatarCache;
use iff_roster::avatar_fetch::{AvatarSource, IdentityResolver, Lookup};

pub const FALLBACK: &str = "https://example.test/default.png";

#[derive(Debug, Clone)]
enum Step<T> {
    Found(T),
    NotFound,
    Fail,
    Hang,
}

/// In-memory stand-in for the users + thumbnails services. Unknown usernames
/// and ids answer `NotFound`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSource {
    searches: HashMap<String, Step<u64>>,
    headshots: HashMap<u64, Step<String>>,
    delay: Duration,
    search_calls: Arc<AtomicUsize>,
    headshot_calls: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, username: &str, id: u64, image_url: &str) -> Self {
        self.searches.insert(username.to_string(), Step::Found(id));
        self.headshots.insert(id, Step::Found(image_url.to_string()));
        self
    }

    pub fn user_without_headshot(mut self, username: &str, id: u64) -> Self {
        self.searches.insert(username.to_string(), Step::Found(id));
        self.headshots.insert(id, Step::NotFound);
        self
    }

    pub fn search_fails(mut self, username: &str) -> Self {
        self.searches.insert(username.to_string(), Step::Fail);
        self
    }

    pub fn search_hangs(mut self, username: &str) -> Self {
        self.searches.insert(username.to_string(), Step::Hang);
        self
    }

    pub fn headshot_fails(mut self, username: &str, id: u64) -> Self {
        self.searches.insert(username.to_string(), Step::Found(id));
        self.headshots.insert(id, Step::Fail);
        self
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn headshot_calls(&self) -> usize {
        self.headshot_calls.load(Ordering::SeqCst)
    }

    pub fn network_calls(&self) -> usize {
        self.search_calls() + self.headshot_calls()
    }

    async fn play<T: Clone>(&self, step: Option<&Step<T>>) -> Result<Lookup<T>> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match step {
            Some(Step::Found(v)) => Ok(Lookup::Found(v.clone())),
            Some(Step::NotFound) | None => Ok(Lookup::NotFound),
            Some(Step::Fail) => Err(anyhow!("http 503 Service Unavailable")),
            Some(Step::Hang) => {
                std::future::pending::<()>().await;
                Err(anyhow!("unreachable"))
            }
        }
    }
}

impl AvatarSource for ScriptedSource {
    async fn search_user_id(&self, username: &str) -> Result<Lookup<u64>> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.play(self.searches.get(username)).await
    }

    async fn headshot_url(&self, user_id: u64) -> Result<Lookup<String>> {
        self.headshot_calls.fetch_add(1, Ordering::SeqCst);
        self.play(self.headshots.get(&user_id)).await
    }
}

pub fn resolver(source: ScriptedSource) -> IdentityResolver<ScriptedSource> {
    IdentityResolver::with_fallback(source, FALLBACK, Duration::from_millis(200))
}

pub fn cache(source: ScriptedSource) -> AvatarCache<ScriptedSource> {
    AvatarCache::new(resolver(source))
}
