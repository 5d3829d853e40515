// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FetchError;

/// Provider field holding an item's descriptive tags (NYT newswire `des_facet`).
pub const TAGS_FIELD: &str = "des_facet";

/// One record from the upstream provider. Kept opaque: the pipeline only ever reads
/// the descriptive tags and otherwise passes the object through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeedItem(Map<String, Value>);

impl FeedItem {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Wrap a JSON value; anything but an object is not a feed item.
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self(fields)),
            _ => None,
        }
    }

    /// Descriptive tags in provider order. Absent, empty, or non-array fields yield none
    /// (the newswire sends `""` instead of `[]` for untagged items).
    pub fn descriptive_tags(&self) -> Vec<&str> {
        match self.0.get(TAGS_FIELD) {
            Some(Value::Array(tags)) => tags.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        }
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

/// Point-in-time capture of the whole upstream feed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSnapshot {
    pub items: Vec<FeedItem>,
    pub fetched_at: DateTime<Utc>,
}

impl RawSnapshot {
    pub fn new(items: Vec<FeedItem>, fetched_at: DateTime<Utc>) -> Self {
        Self { items, fetched_at }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Upstream feed source. One call, no retries; a result is either complete or an error.
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self) -> Result<RawSnapshot, FetchError>;
    fn name(&self) -> &'static str;
}
