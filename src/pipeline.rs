//! # Pipeline orchestrator
//! fetch → cache → persist → filter → fallback, once per request.
//!
//! Terminal: fetch failure with no live cache entry; raw publish failure under
//! [`PublishPolicy::Strict`]. Everything after a feed is in hand degrades instead
//! of failing: a broken filter yields the unfiltered feed.

use std::str::FromStr;
use std::sync::Arc;

use metrics::counter;
use serde::Deserialize;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{FetchError, PipelineError};
use crate::filter::{filter_by_preferences, FilterKind, PreferenceFilter};
use crate::ingest::cache::SnapshotCache;
use crate::ingest::types::{FeedItem, FeedSource, RawSnapshot};
use crate::publish::SnapshotPublisher;

/// What a failed raw-snapshot upload means for the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishPolicy {
    /// Upload failure fails the request.
    #[default]
    Strict,
    /// Upload failure is logged; the in-memory snapshot is still filtered and served.
    Degraded,
}

impl FromStr for PublishPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "degraded" => Ok(Self::Degraded),
            other => Err(format!("unknown publish policy `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Which path produced the served items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    Local,
    Remote,
    /// Filter failed; the unfiltered feed was served.
    Fallback,
}

impl FilterOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterOutcome::Local => "local",
            FilterOutcome::Remote => "remote",
            FilterOutcome::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PersonalizedFeed {
    pub items: Vec<FeedItem>,
    pub cache: CacheStatus,
    pub filter: FilterOutcome,
    /// Key of the raw snapshot written for this request; `None` if the upload was skipped over.
    pub raw_key: Option<String>,
}

pub struct NewsPipeline {
    cache: Arc<SnapshotCache>,
    source: Arc<dyn FeedSource>,
    publisher: SnapshotPublisher,
    filter: Arc<dyn PreferenceFilter>,
    policy: PublishPolicy,
    // coalesces concurrent cache misses into one upstream call
    fetch_gate: AsyncMutex<()>,
}

impl NewsPipeline {
    pub fn new(
        cache: Arc<SnapshotCache>,
        source: Arc<dyn FeedSource>,
        publisher: SnapshotPublisher,
        filter: Arc<dyn PreferenceFilter>,
        policy: PublishPolicy,
    ) -> Self {
        Self {
            cache,
            source,
            publisher,
            filter,
            policy,
            fetch_gate: AsyncMutex::new(()),
        }
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    pub fn publisher(&self) -> &SnapshotPublisher {
        &self.publisher
    }

    pub fn policy(&self) -> PublishPolicy {
        self.policy
    }

    pub fn filter_kind(&self) -> FilterKind {
        self.filter.kind()
    }

    /// Live cache entry, else one upstream fetch. The cache is written only on fetch success.
    pub async fn obtain_raw(&self) -> Result<(RawSnapshot, CacheStatus), FetchError> {
        if let Some(hit) = self.cache.get() {
            counter!("news_cache_hits_total").increment(1);
            return Ok((hit, CacheStatus::Hit));
        }

        let _gate = self.fetch_gate.lock().await;
        // another request may have filled the slot while we waited
        if let Some(hit) = self.cache.get() {
            counter!("news_cache_hits_total").increment(1);
            return Ok((hit, CacheStatus::Hit));
        }
        counter!("news_cache_misses_total").increment(1);

        let snapshot = self.source.fetch().await?;
        self.cache.put(snapshot.clone());
        tracing::info!(
            target: "pipeline",
            source = self.source.name(),
            items = snapshot.len(),
            fetched_at = %snapshot.fetched_at,
            "cache refreshed"
        );
        Ok((snapshot, CacheStatus::Miss))
    }

    /// Full personalized run for one principal's preferences.
    pub async fn personalized(
        &self,
        preferences: &[String],
    ) -> Result<PersonalizedFeed, PipelineError> {
        let (snapshot, cache) = self.obtain_raw().await?;

        let raw_key = match self.publisher.publish_raw(&snapshot).await {
            Ok(key) => Some(key),
            Err(e) if self.policy == PublishPolicy::Degraded => {
                tracing::warn!(
                    target: "pipeline",
                    error = %e,
                    "raw upload failed; continuing with in-memory snapshot"
                );
                None
            }
            Err(e) => return Err(e.into()),
        };

        // the remote service reads the newest stored raw object; without our upload it
        // would filter an older fetch, so the in-memory snapshot is filtered here instead
        if raw_key.is_none() && self.filter.kind() == FilterKind::Remote {
            tracing::warn!(
                target: "pipeline",
                "raw snapshot not stored; filtering in-memory snapshot locally"
            );
            let items = filter_by_preferences(snapshot.items, preferences);
            return Ok(self.served(items, cache, FilterOutcome::Local, preferences, raw_key));
        }

        let filtered = self.filter.apply(&snapshot, preferences).await;
        let (items, filter) = match filtered {
            Ok(items) => {
                let outcome = match self.filter.kind() {
                    FilterKind::Local => FilterOutcome::Local,
                    FilterKind::Remote => FilterOutcome::Remote,
                };
                (items, outcome)
            }
            Err(e) => {
                counter!("news_filter_fallback_total").increment(1);
                tracing::error!(
                    target: "pipeline",
                    error = %e,
                    items = snapshot.len(),
                    "filter failed; serving unfiltered feed"
                );
                (snapshot.items, FilterOutcome::Fallback)
            }
        };

        Ok(self.served(items, cache, filter, preferences, raw_key))
    }

    fn served(
        &self,
        items: Vec<FeedItem>,
        cache: CacheStatus,
        filter: FilterOutcome,
        preferences: &[String],
        raw_key: Option<String>,
    ) -> PersonalizedFeed {
        counter!("news_items_served_total").increment(items.len() as u64);
        tracing::info!(
            target: "pipeline",
            cache = cache.as_str(),
            filter = filter.as_str(),
            preferences = preferences.len(),
            served = items.len(),
            "personalized feed ready"
        );

        PersonalizedFeed {
            items,
            cache,
            filter,
            raw_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_policy_parses_case_insensitively() {
        assert_eq!("Strict".parse::<PublishPolicy>().unwrap(), PublishPolicy::Strict);
        assert_eq!(" degraded ".parse::<PublishPolicy>().unwrap(), PublishPolicy::Degraded);
        assert!("lenient".parse::<PublishPolicy>().is_err());
        assert_eq!(PublishPolicy::default(), PublishPolicy::Strict);
    }

    #[test]
    fn diagnostic_labels() {
        assert_eq!(CacheStatus::Hit.as_str(), "HIT");
        assert_eq!(FilterOutcome::Fallback.as_str(), "fallback");
    }
}
