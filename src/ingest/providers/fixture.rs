// src/ingest/providers/fixture.rs
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use crate::error::FetchError;
use crate::ingest::parse_feed_body;
use crate::ingest::types::{FeedItem, FeedSource, RawSnapshot};

/// In-process feed source serving fixed content (fixture file, item list, or a canned error).
/// Counts calls so callers can tell whether the upstream was actually hit.
pub struct StaticSource {
    outcome: Result<Vec<FeedItem>, FetchError>,
    calls: AtomicUsize,
}

impl StaticSource {
    pub fn from_items(items: Vec<FeedItem>) -> Self {
        Self {
            outcome: Ok(items),
            calls: AtomicUsize::new(0),
        }
    }

    /// Parse a provider-shaped JSON body. A malformed fixture behaves like a malformed
    /// provider response: every fetch fails.
    pub fn from_fixture(content: &str) -> Self {
        Self {
            outcome: parse_feed_body(content.as_bytes()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            outcome: Err(FetchError::new(message)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FeedSource for StaticSource {
    async fn fetch(&self) -> Result<RawSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome
            .clone()
            .map(|items| RawSnapshot::new(items, Utc::now()))
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
