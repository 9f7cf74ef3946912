mod common;

use std::sync::mpsc;
use std::time::Duration;

use iff_roster::avatar_feed::{AvatarSummary, stream_avatars};
use iff_roster::avatar_fetch::{IdentityResolver, Lookup};
use iff_roster::state::Delta;

use common::{FALLBACK, ScriptedSource, cache, resolver};

const KANTE_URL: &str = "https://tr.rbxcdn.com/kante-150.png";
const ZICO_URL: &str = "https://tr.rbxcdn.com/zico-150.png";

#[tokio::test]
async fn resolve_returns_headshot_url() {
    let resolver = resolver(ScriptedSource::new().user("MPS_Kante", 11, KANTE_URL));
    assert_eq!(resolver.resolve("MPS_Kante").await, KANTE_URL);
    assert_eq!(resolver.source().search_calls(), 1);
    assert_eq!(resolver.source().headshot_calls(), 1);
}

#[tokio::test]
async fn unknown_user_stops_after_search() {
    let resolver = resolver(ScriptedSource::new());
    assert_eq!(resolver.lookup("nobody").await, Lookup::NotFound);
    assert_eq!(resolver.resolve("nobody").await, FALLBACK);
    assert_eq!(resolver.source().headshot_calls(), 0);
}

#[tokio::test]
async fn every_failing_stage_collapses_to_fallback() {
    let source = ScriptedSource::new()
        .search_fails("down")
        .headshot_fails("thumb_down", 7)
        .user_without_headshot("blank", 8);
    let resolver = resolver(source);

    assert_eq!(resolver.resolve("down").await, FALLBACK);
    assert_eq!(resolver.resolve("thumb_down").await, FALLBACK);
    assert_eq!(resolver.resolve("blank").await, FALLBACK);
}

#[tokio::test]
async fn empty_username_skips_network() {
    let resolver = resolver(ScriptedSource::new());
    assert_eq!(resolver.resolve("").await, FALLBACK);
    assert_eq!(resolver.resolve("   ").await, FALLBACK);
    assert_eq!(resolver.source().network_calls(), 0);
}

#[tokio::test]
async fn blank_fallback_is_replaced_with_default() {
    let resolver =
        IdentityResolver::with_fallback(ScriptedSource::new(), "", Duration::from_millis(50));
    assert!(!resolver.resolve("nobody").await.is_empty());
}

#[tokio::test]
async fn sequential_lookups_resolve_once() {
    let cache = cache(ScriptedSource::new().user("MPS_Kante", 11, KANTE_URL));

    assert_eq!(cache.get_or_resolve("MPS_Kante").await, KANTE_URL);
    assert_eq!(cache.get_or_resolve("MPS_Kante").await, KANTE_URL);

    let source = cache.resolver().source();
    assert_eq!(source.search_calls(), 1);
    assert_eq!(source.headshot_calls(), 1);
    assert_eq!(cache.resolutions_started(), 1);
}

#[tokio::test]
async fn timed_out_search_is_cached_as_fallback() {
    let cache = cache(ScriptedSource::new().search_hangs("slowpoke"));

    assert_eq!(cache.get_or_resolve("slowpoke").await, FALLBACK);
    let calls_after_first = cache.resolver().source().network_calls();
    assert_eq!(calls_after_first, 1);

    assert_eq!(cache.get_or_resolve("slowpoke").await, FALLBACK);
    assert_eq!(cache.resolver().source().network_calls(), calls_after_first);
    assert_eq!(cache.cached("slowpoke").as_deref(), Some(FALLBACK));
}

#[tokio::test]
async fn concurrent_requests_share_one_resolution() {
    let source = ScriptedSource::new()
        .user("MPS_Kante", 11, KANTE_URL)
        .with_delay(Duration::from_millis(20));
    let cache = cache(source);

    let (a, b, c) = tokio::join!(
        cache.get_or_resolve("MPS_Kante"),
        cache.get_or_resolve("MPS_Kante"),
        cache.get_or_resolve("MPS_Kante"),
    );

    assert_eq!(a, KANTE_URL);
    assert_eq!(b, KANTE_URL);
    assert_eq!(c, KANTE_URL);
    assert_eq!(cache.resolver().source().search_calls(), 1);
    assert_eq!(cache.resolutions_started(), 1);
}

#[tokio::test]
async fn distinct_usernames_resolve_independently() {
    let source = ScriptedSource::new()
        .user("MPS_Kante", 11, KANTE_URL)
        .user("iLegendZico", 12, ZICO_URL)
        .search_fails("deashui")
        .with_delay(Duration::from_millis(5));
    let cache = cache(source);

    let (kante, zico, deashui) = tokio::join!(
        cache.get_or_resolve("MPS_Kante"),
        cache.get_or_resolve("iLegendZico"),
        cache.get_or_resolve("deashui"),
    );

    assert_eq!(kante, KANTE_URL);
    assert_eq!(zico, ZICO_URL);
    assert_eq!(deashui, FALLBACK);
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.resolutions_started(), 3);
}

#[tokio::test]
async fn peek_does_not_start_resolution() {
    let cache = cache(ScriptedSource::new().user("MPS_Kante", 11, KANTE_URL));

    assert_eq!(cache.cached("MPS_Kante"), None);
    assert!(cache.is_empty());
    assert_eq!(cache.resolver().source().network_calls(), 0);

    cache.get_or_resolve("MPS_Kante").await;
    assert_eq!(cache.cached("MPS_Kante").as_deref(), Some(KANTE_URL));
    assert_eq!(cache.in_flight(), 0);
}

#[tokio::test]
async fn pending_entry_is_not_reported_as_cached() {
    let source = ScriptedSource::new()
        .user("MPS_Kante", 11, KANTE_URL)
        .with_delay(Duration::from_millis(20));
    let cache = cache(source);

    let request = cache.request("MPS_Kante");
    assert_eq!(cache.in_flight(), 1);
    assert_eq!(cache.cached("MPS_Kante"), None);

    assert_eq!(request.await, KANTE_URL);
    assert_eq!(cache.in_flight(), 0);
    assert_eq!(cache.len(), 1);
}

#[tokio::test]
async fn request_outlives_dropped_cache() {
    let source = ScriptedSource::new()
        .user("MPS_Kante", 11, KANTE_URL)
        .with_delay(Duration::from_millis(10));
    let cache = cache(source);

    let request = cache.request("MPS_Kante");
    drop(cache);

    assert_eq!(request.await, KANTE_URL);
}

#[tokio::test]
async fn cancelled_caller_does_not_restart_resolution() {
    let source = ScriptedSource::new()
        .user("MPS_Kante", 11, KANTE_URL)
        .with_delay(Duration::from_millis(30));
    let cache = cache(source);

    let early =
        tokio::time::timeout(Duration::from_millis(5), cache.get_or_resolve("MPS_Kante")).await;
    assert!(early.is_err());
    assert_eq!(cache.in_flight(), 1);

    assert_eq!(cache.get_or_resolve("MPS_Kante").await, KANTE_URL);
    assert_eq!(cache.resolver().source().search_calls(), 1);
    assert_eq!(cache.resolutions_started(), 1);
}

#[tokio::test]
async fn stream_forwards_each_avatar_then_finishes() {
    let source = ScriptedSource::new()
        .user("MPS_Kante", 11, KANTE_URL)
        .user("iLegendZico", 12, ZICO_URL)
        .search_fails("deashui");
    let cache = cache(source);
    let (tx, rx) = mpsc::channel();

    let names = vec![
        "deashui".to_string(),
        "MPS_Kante".to_string(),
        "iLegendZico".to_string(),
    ];
    let summary = stream_avatars(&cache, names, 2, &tx).await;
    assert_eq!(
        summary,
        AvatarSummary {
            resolved: 2,
            fallback: 1
        }
    );

    let deltas: Vec<Delta> = rx.try_iter().collect();
    assert_eq!(deltas.len(), 4);
    assert!(deltas.contains(&Delta::AvatarResolved {
        username: "deashui".to_string(),
        image_url: FALLBACK.to_string(),
    }));
    assert_eq!(
        deltas.last(),
        Some(&Delta::AvatarsFinished {
            resolved: 2,
            fallback: 1
        })
    );
}

#[tokio::test]
async fn stream_stops_when_receiver_is_gone() {
    let cache = cache(ScriptedSource::new().user("MPS_Kante", 11, KANTE_URL));
    let (tx, rx) = mpsc::channel();
    drop(rx);

    let names = vec!["MPS_Kante".to_string(), "deashui".to_string()];
    let summary = stream_avatars(&cache, names, 1, &tx).await;
    assert_eq!(summary.resolved + summary.fallback, 1);
}
