//! Snapshot publisher: durable, timestamped copies of the feed in the object store.
//!
//! Keys look like `raw/news-2024-05-01-13-45-00.json`. Objects are only ever added;
//! "latest" means the greatest `last_modified` under a prefix.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;

use crate::error::{LoadError, NotFoundError, PublishError};
use crate::ingest::types::{FeedItem, RawSnapshot};
use crate::store::{ObjectMeta, ObjectStore, StoreError};

pub const RAW_PREFIX: &str = "raw";
pub const PROCESSED_PREFIX: &str = "processed";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// `{prefix}/news-{YYYY-mm-dd-HH-MM-SS}.json`; lexical order equals time order.
pub fn object_key(prefix: &str, at: DateTime<Utc>) -> String {
    format!("{prefix}/news-{}.json", at.format("%Y-%m-%d-%H-%M-%S"))
}

/// `{prefix}/news-{YYYY-mm-dd-HH-MM-SS}-{nanos}-{tag}.json`: same ordering as
/// [`object_key`] but unique per write, for outputs that several callers produce
/// within the same second.
pub fn unique_object_key(prefix: &str, at: DateTime<Utc>) -> String {
    let tag = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{prefix}/news-{}-{}.json",
        at.format("%Y-%m-%d-%H-%M-%S-%9f"),
        &tag[..8]
    )
}

/// Newest object by `last_modified`. Ties go to the first one in listing order,
/// which is stable for a given backend within one process run.
pub fn latest(objects: &[ObjectMeta]) -> Option<&ObjectMeta> {
    objects.iter().fold(None, |best: Option<&ObjectMeta>, o| match best {
        Some(b) if o.last_modified <= b.last_modified => Some(b),
        _ => Some(o),
    })
}

#[derive(Clone)]
pub struct SnapshotPublisher {
    store: Arc<dyn ObjectStore>,
    timeout: Duration,
}

impl SnapshotPublisher {
    pub fn new(store: Arc<dyn ObjectStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Write the full item list under `raw/`, keyed by the snapshot's fetch time.
    pub async fn publish_raw(&self, snapshot: &RawSnapshot) -> Result<String, PublishError> {
        self.publish(object_key(RAW_PREFIX, snapshot.fetched_at), &snapshot.items)
            .await
    }

    /// Write a filter output under `processed/`. Every call adds a new object.
    pub async fn publish_processed(
        &self,
        items: &[FeedItem],
        at: DateTime<Utc>,
    ) -> Result<String, PublishError> {
        self.publish(unique_object_key(PROCESSED_PREFIX, at), items)
            .await
    }

    /// Body of the newest `processed/` object. `NotFound` when nothing was processed yet.
    pub async fn fetch_latest_processed(&self) -> Result<Vec<FeedItem>, LoadError> {
        self.fetch_latest(PROCESSED_PREFIX, NotFoundError::Processed)
            .await
    }

    /// Body of the newest `raw/` object.
    pub async fn fetch_latest_raw(&self) -> Result<Vec<FeedItem>, LoadError> {
        self.fetch_latest(RAW_PREFIX, NotFoundError::Raw).await
    }

    async fn publish(&self, key: String, items: &[FeedItem]) -> Result<String, PublishError> {
        let result = async {
            let body = serde_json::to_vec(items)?;
            let bytes = body.len();
            self.bounded(self.store.put(&key, body, JSON_CONTENT_TYPE))
                .await
                .ok_or(PublishError::Timeout(self.timeout))??;
            Ok::<usize, PublishError>(bytes)
        }
        .await;

        match result {
            Ok(bytes) => {
                tracing::info!(
                    target: "publish",
                    bucket = self.store.bucket(),
                    key = %key,
                    items = items.len(),
                    bytes,
                    "snapshot stored"
                );
                Ok(key)
            }
            Err(e) => {
                counter!("news_publish_errors_total").increment(1);
                tracing::warn!(target: "publish", key = %key, error = %e, "snapshot store failed");
                Err(e)
            }
        }
    }

    async fn fetch_latest(
        &self,
        prefix: &str,
        none: NotFoundError,
    ) -> Result<Vec<FeedItem>, LoadError> {
        let listed = self
            .bounded(self.store.list(&format!("{prefix}/")))
            .await
            .ok_or(LoadError::Timeout(self.timeout))??;
        let Some(newest) = latest(&listed) else {
            return Err(none.into());
        };

        let obj = match self.bounded(self.store.get(&newest.key)).await {
            None => return Err(LoadError::Timeout(self.timeout)),
            // listed a moment ago; treat a concurrent disappearance as "nothing there"
            Some(Err(StoreError::Missing(_))) => return Err(none.into()),
            Some(other) => other?,
        };
        tracing::debug!(target: "publish", key = %obj.key, "loaded latest snapshot");
        Ok(serde_json::from_slice(&obj.body)?)
    }

    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::time::timeout(self.timeout, fut).await.ok()
    }
}
