//! Pipeline orchestration: cache reuse, publish policy, and fetch failure.
//!
//! Covered (strict):
//! - MISS then HIT within the window; the upstream is called once
//! - concurrent misses share a single upstream call
//! - fetch failure with an empty cache fails and writes nothing
//! - store outage: Strict fails the request, Degraded serves the filtered feed
//! - each request re-publishes the snapshot it served

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use news_galore::error::PipelineError;
use news_galore::filter::LocalFilter;
use news_galore::ingest::cache::SnapshotCache;
use news_galore::ingest::providers::StaticSource;
use news_galore::ingest::types::FeedItem;
use news_galore::pipeline::{CacheStatus, FilterOutcome, NewsPipeline, PublishPolicy};
use news_galore::publish::SnapshotPublisher;
use news_galore::store::{InMemoryObjectStore, ObjectStore};

fn item(title: &str, tags: Value) -> FeedItem {
    FeedItem::from_json(json!({ "title": title, "des_facet": tags })).expect("object item")
}

fn feed() -> Vec<FeedItem> {
    vec![
        item("a", json!(["Politics"])),
        item("b", json!(["Sports"])),
        item("c", json!("")),
    ]
}

struct Harness {
    pipeline: Arc<NewsPipeline>,
    source: Arc<StaticSource>,
    store: Arc<InMemoryObjectStore>,
}

fn harness(source: StaticSource, policy: PublishPolicy) -> Harness {
    let source = Arc::new(source);
    let store = Arc::new(InMemoryObjectStore::new("bucket"));
    let pipeline = NewsPipeline::new(
        Arc::new(SnapshotCache::new_1h()),
        source.clone(),
        SnapshotPublisher::new(store.clone(), Duration::from_secs(5)),
        Arc::new(LocalFilter),
        policy,
    );
    Harness {
        pipeline: Arc::new(pipeline),
        source,
        store,
    }
}

fn prefs(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn second_request_is_served_from_cache() {
    let h = harness(StaticSource::from_items(feed()), PublishPolicy::Strict);

    let first = h
        .pipeline
        .personalized(&prefs(&["sports"]))
        .await
        .expect("first run");
    assert_eq!(first.cache, CacheStatus::Miss);
    assert_eq!(first.filter, FilterOutcome::Local);
    assert_eq!(first.items, vec![item("b", json!(["Sports"]))]);

    let second = h
        .pipeline
        .personalized(&prefs(&["politics"]))
        .await
        .expect("second run");
    assert_eq!(second.cache, CacheStatus::Hit);
    assert_eq!(second.items, vec![item("a", json!(["Politics"]))]);

    assert_eq!(h.source.calls(), 1, "upstream called once within the window");
    // same snapshot, same fetch time, same key
    assert_eq!(first.raw_key, second.raw_key);
    assert_eq!(h.store.len(), 1);
}

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let h = harness(StaticSource::from_items(feed()), PublishPolicy::Strict);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let p = h.pipeline.clone();
        tasks.push(tokio::spawn(async move { p.obtain_raw().await }));
    }
    let mut misses = 0;
    for t in tasks {
        let (snap, status) = t.await.expect("join").expect("fetch ok");
        assert_eq!(snap.len(), 3);
        if status == CacheStatus::Miss {
            misses += 1;
        }
    }
    assert_eq!(misses, 1);
    assert_eq!(h.source.calls(), 1);
}

#[tokio::test]
async fn fetch_failure_is_terminal_and_writes_nothing() {
    let h = harness(StaticSource::failing("provider returned HTTP 500"), PublishPolicy::Strict);

    let err = h
        .pipeline
        .personalized(&prefs(&["sports"]))
        .await
        .expect_err("no cache, no feed");
    assert!(matches!(err, PipelineError::Fetch(_)), "got {err:?}");
    assert!(h.store.is_empty());
    assert!(h.pipeline.cache().get().is_none(), "failures are not cached");

    // the next request tries the upstream again
    let _ = h.pipeline.personalized(&prefs(&[])).await;
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test]
async fn strict_policy_fails_on_store_outage() {
    let h = harness(StaticSource::from_items(feed()), PublishPolicy::Strict);
    h.store.set_unavailable(true);

    let err = h
        .pipeline
        .personalized(&prefs(&["sports"]))
        .await
        .expect_err("strict upload failure");
    assert!(matches!(err, PipelineError::Publish(_)), "got {err:?}");
    // the fetch itself succeeded, so the snapshot stays cached
    assert!(h.pipeline.cache().get().is_some());
}

#[tokio::test]
async fn degraded_policy_serves_feed_on_store_outage() {
    let h = harness(StaticSource::from_items(feed()), PublishPolicy::Degraded);
    h.store.set_unavailable(true);

    let out = h
        .pipeline
        .personalized(&prefs(&["sports"]))
        .await
        .expect("degraded run");
    assert_eq!(out.raw_key, None);
    assert_eq!(out.items, vec![item("b", json!(["Sports"]))]);

    h.store.set_unavailable(false);
    let listed = h.store.list("raw/").await.expect("list");
    assert!(listed.is_empty());
}

#[tokio::test]
async fn empty_preferences_serve_whole_feed() {
    let h = harness(StaticSource::from_items(feed()), PublishPolicy::Strict);
    let out = h.pipeline.personalized(&[]).await.expect("run");
    assert_eq!(out.items, feed());
}
