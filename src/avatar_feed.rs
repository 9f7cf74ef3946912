use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::avatar_cache::AvatarCache;
use crate::avatar_fetch::{AvatarSource, IdentityResolver, RobloxAvatarSource};
use crate::config::AvatarConfig;
use crate::roster::Roster;
use crate::state::Delta;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AvatarSummary {
    pub resolved: usize,
    pub fallback: usize,
}

/// Resolves every roster avatar on a worker thread and streams the results
/// back as `Delta`s. The UI thread never waits on the network.
pub fn spawn_avatar_provider(tx: Sender<Delta>, roster: Arc<Roster>, config: AvatarConfig) {
    thread::spawn(move || {
        let usernames: Vec<String> = roster.usernames().map(str::to_string).collect();

        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = tx.send(Delta::Log(format!("[WARN] Avatar worker failed: {err}")));
                send_fallbacks(&tx, &usernames, &config.fallback_url);
                return;
            }
        };

        let source = match RobloxAvatarSource::from_config(&config) {
            Ok(source) => source,
            Err(err) => {
                let _ = tx.send(Delta::Log(format!("[WARN] Avatar lookups disabled: {err:#}")));
                send_fallbacks(&tx, &usernames, &config.fallback_url);
                return;
            }
        };

        let cache = AvatarCache::new(IdentityResolver::new(source, &config));
        runtime.block_on(stream_avatars(&cache, usernames, config.concurrency, &tx));
    });
}

/// Drives the cache for each username with at most `concurrency` lookups in
/// flight and forwards results in completion order. Stops early when the
/// receiver hangs up.
pub async fn stream_avatars<S: AvatarSource>(
    cache: &AvatarCache<S>,
    usernames: Vec<String>,
    concurrency: usize,
    tx: &Sender<Delta>,
) -> AvatarSummary {
    let mut summary = AvatarSummary::default();
    let mut results = stream::iter(usernames)
        .map(|username| {
            let request = cache.request(&username);
            async move { (username, request.await) }
        })
        .buffer_unordered(concurrency.max(1));

    while let Some((username, image_url)) = results.next().await {
        if image_url == cache.fallback_url() {
            summary.fallback += 1;
        } else {
            summary.resolved += 1;
        }
        let delta = Delta::AvatarResolved {
            username,
            image_url,
        };
        if tx.send(delta).is_err() {
            debug!("avatar receiver closed, stopping");
            return summary;
        }
    }

    info!(
        resolved = summary.resolved,
        fallback = summary.fallback,
        "avatar pass finished"
    );
    let _ = tx.send(Delta::AvatarsFinished {
        resolved: summary.resolved,
        fallback: summary.fallback,
    });
    summary
}

fn send_fallbacks(tx: &Sender<Delta>, usernames: &[String], fallback_url: &str) {
    for username in usernames {
        let _ = tx.send(Delta::AvatarResolved {
            username: username.clone(),
            image_url: fallback_url.to_string(),
        });
    }
    let _ = tx.send(Delta::AvatarsFinished {
        resolved: 0,
        fallback: usernames.len(),
    });
}
