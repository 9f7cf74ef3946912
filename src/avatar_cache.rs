use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures::future::{self, BoxFuture, Either, FutureExt, Ready, Shared};
use tracing::debug;

use crate::avatar_fetch::{AvatarSource, IdentityResolver};

pub type PendingAvatar = Shared<BoxFuture<'static, String>>;

/// Future handed out by [`AvatarCache::request`].
pub type AvatarRequest = Either<Ready<String>, PendingAvatar>;

enum Slot {
    Pending(PendingAvatar),
    Ready(String),
}

#[derive(Default)]
struct Slots {
    by_username: Mutex<HashMap<String, Slot>>,
    #[cfg(test)]
    writes: AtomicUsize,
}

impl Slots {
    /// Confirms a result. An entry that is already `Ready` is never replaced.
    fn settle(&self, username: &str, url: &str) {
        let mut guard = self.by_username.lock().expect("avatar cache lock poisoned");
        match guard.entry(username.to_string()) {
            Entry::Occupied(mut slot) => {
                if !matches!(slot.get(), Slot::Pending(_)) {
                    return;
                }
                slot.insert(Slot::Ready(url.to_string()));
            }
            Entry::Vacant(slot) => {
                slot.insert(Slot::Ready(url.to_string()));
            }
        }
        #[cfg(test)]
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Username -> image URL for the life of the process.
///
/// Each username is resolved at most once. Callers that arrive while a
/// resolution is still running await the same shared future instead of
/// starting another one, and a fallback result is cached like any other.
/// Clones share the same entries.
pub struct AvatarCache<S> {
    resolver: Arc<IdentityResolver<S>>,
    slots: Arc<Slots>,
    started: Arc<AtomicUsize>,
}

impl<S> Clone for AvatarCache<S> {
    fn clone(&self) -> Self {
        Self {
            resolver: Arc::clone(&self.resolver),
            slots: Arc::clone(&self.slots),
            started: Arc::clone(&self.started),
        }
    }
}

impl<S: AvatarSource> AvatarCache<S> {
    pub fn new(resolver: IdentityResolver<S>) -> Self {
        Self {
            resolver: Arc::new(resolver),
            slots: Arc::new(Slots::default()),
            started: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn resolver(&self) -> &IdentityResolver<S> {
        &self.resolver
    }

    pub fn fallback_url(&self) -> &str {
        self.resolver.fallback_url()
    }

    pub async fn get_or_resolve(&self, username: &str) -> String {
        self.request(username).await
    }

    /// Like `get_or_resolve`, but the returned future does not keep the cache
    /// alive. If every handle is dropped before it finishes, the result is
    /// returned to the awaiting caller and never written back.
    pub fn request(&self, username: &str) -> AvatarRequest {
        let mut guard = self.slots.by_username.lock().expect("avatar cache lock poisoned");
        match guard.get(username) {
            Some(Slot::Ready(url)) => Either::Left(future::ready(url.clone())),
            Some(Slot::Pending(pending)) => Either::Right(pending.clone()),
            None => {
                let pending = self.start_resolution(username);
                guard.insert(username.to_string(), Slot::Pending(pending.clone()));
                Either::Right(pending)
            }
        }
    }

    /// Settled value for `username`, if any. Never waits and never starts a
    /// resolution.
    pub fn cached(&self, username: &str) -> Option<String> {
        let guard = self.slots.by_username.lock().expect("avatar cache lock poisoned");
        match guard.get(username) {
            Some(Slot::Ready(url)) => Some(url.clone()),
            _ => None,
        }
    }

    /// Number of settled entries.
    pub fn len(&self) -> usize {
        let guard = self.slots.by_username.lock().expect("avatar cache lock poisoned");
        guard.values().filter(|slot| matches!(slot, Slot::Ready(_))).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        let guard = self.slots.by_username.lock().expect("avatar cache lock poisoned");
        guard.values().filter(|slot| matches!(slot, Slot::Pending(_))).count()
    }

    /// How many resolutions this cache has ever started.
    pub fn resolutions_started(&self) -> usize {
        self.started.load(Ordering::Relaxed)
    }

    fn start_resolution(&self, username: &str) -> PendingAvatar {
        self.started.fetch_add(1, Ordering::Relaxed);
        let resolver = Arc::clone(&self.resolver);
        let slots: Weak<Slots> = Arc::downgrade(&self.slots);
        let username = username.to_string();
        async move {
            let url = resolver.resolve(&username).await;
            match slots.upgrade() {
                Some(slots) => slots.settle(&username, &url),
                None => debug!(username = %username, "avatar cache gone, dropping late result"),
            }
            url
        }
        .boxed()
        .shared()
    }
}
