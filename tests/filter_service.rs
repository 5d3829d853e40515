//! Filtering service envelope semantics.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use news_galore::filter::FilterService;
use news_galore::ingest::types::{FeedItem, RawSnapshot};
use news_galore::publish::SnapshotPublisher;
use news_galore::store::{InMemoryObjectStore, ObjectStore};

fn items() -> Vec<FeedItem> {
    vec![
        FeedItem::from_json(json!({ "title": "a", "des_facet": ["Politics"] })).unwrap(),
        FeedItem::from_json(json!({ "title": "b", "des_facet": ["Sports"] })).unwrap(),
    ]
}

async fn seeded(write_processed: bool) -> (FilterService, Arc<InMemoryObjectStore>) {
    let store = Arc::new(InMemoryObjectStore::new("bucket"));
    let publisher = SnapshotPublisher::new(store.clone(), Duration::from_secs(5));
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    publisher
        .publish_raw(&RawSnapshot::new(items(), at))
        .await
        .expect("seed raw");
    (FilterService::new(publisher, write_processed), store)
}

#[tokio::test]
async fn missing_raw_snapshot_is_404_envelope() {
    let store = Arc::new(InMemoryObjectStore::new("bucket"));
    let svc = FilterService::new(SnapshotPublisher::new(store, Duration::from_secs(5)), true);

    let env = svc.handle(&["sports".to_string()]).await;
    assert_eq!(env.status_code, 404);
    let body: serde_json::Value = serde_json::from_str(&env.body).unwrap();
    assert_eq!(body["error"], "No raw news files found");
}

#[tokio::test]
async fn filters_latest_raw_and_keeps_processed_copy() {
    let (svc, store) = seeded(true).await;

    let env = svc.handle(&["SPORTS".to_string()]).await;
    assert_eq!(env.status_code, 200);
    let kept: Vec<FeedItem> = serde_json::from_str(&env.body).unwrap();
    assert_eq!(kept, vec![items()[1].clone()]);

    let processed = store.list("processed/").await.unwrap();
    assert_eq!(processed.len(), 1);
}

#[tokio::test]
async fn rapid_calls_each_keep_their_processed_copy() {
    let (svc, store) = seeded(true).await;
    let publisher = SnapshotPublisher::new(store.clone(), Duration::from_secs(5));

    // well inside one second: every answer still gets its own object
    for prefs in [vec!["politics"], vec![], vec!["sports"]] {
        let prefs: Vec<String> = prefs.into_iter().map(String::from).collect();
        assert_eq!(svc.handle(&prefs).await.status_code, 200);
    }

    let processed = store.list("processed/").await.unwrap();
    assert_eq!(processed.len(), 3);
    assert_eq!(
        publisher.fetch_latest_processed().await.unwrap(),
        vec![items()[1].clone()],
        "latest is the last answer given"
    );
}

#[tokio::test]
async fn processed_copy_can_be_disabled() {
    let (svc, store) = seeded(false).await;

    let env = svc.handle(&[]).await;
    assert_eq!(env.status_code, 200);
    let kept: Vec<FeedItem> = serde_json::from_str(&env.body).unwrap();
    assert_eq!(kept, items(), "no preferences keeps everything");
    assert!(store.list("processed/").await.unwrap().is_empty());
}

#[tokio::test]
async fn store_outage_is_500_envelope() {
    let (svc, store) = seeded(true).await;
    store.set_unavailable(true);

    let env = svc.handle(&["sports".to_string()]).await;
    assert_eq!(env.status_code, 500);
}

#[test]
fn envelope_uses_status_code_field_name() {
    let env = news_galore::filter::FilterEnvelope {
        status_code: 200,
        body: "[]".into(),
    };
    assert_eq!(
        serde_json::to_value(&env).unwrap(),
        json!({ "statusCode": 200, "body": "[]" })
    );
}
