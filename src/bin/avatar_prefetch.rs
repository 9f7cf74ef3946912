use anyhow::{Context, Result};
use futures::future::join_all;

use iff_roster::avatar_cache::AvatarCache;
use iff_roster::avatar_fetch::{IdentityResolver, RobloxAvatarSource};
use iff_roster::config::{self, AppConfig};
use iff_roster::roster;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    config::load_dotenv();
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let config = AppConfig::from_env();
    let limit = std::env::var("AVATAR_PREFETCH_LIMIT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(50)
        .clamp(1, 500);

    // Usernames on the command line take priority over the roster.
    let mut usernames: Vec<String> = std::env::args().skip(1).collect();
    if usernames.is_empty() {
        let roster = roster::load_roster(config.roster_path.as_deref())
            .context("load roster for prefetch")?;
        usernames = roster.usernames().map(str::to_string).collect();
    }
    usernames.truncate(limit);

    let source = RobloxAvatarSource::from_config(&config.avatar)?;
    let cache = AvatarCache::new(IdentityResolver::new(source, &config.avatar));

    println!("Resolving {} avatars:", usernames.len());
    let urls = join_all(usernames.iter().map(|name| cache.get_or_resolve(name))).await;
    for (name, url) in usernames.iter().zip(&urls) {
        if url == cache.fallback_url() {
            println!("DEF {name}: {url}");
        } else {
            println!("OK  {name}: {url}");
        }
    }

    println!(
        "{} cached, {} resolutions started",
        cache.len(),
        cache.resolutions_started()
    );
    Ok(())
}
