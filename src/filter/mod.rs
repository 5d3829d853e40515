//! Preference filtering.
//!
//! [`filter_by_preferences`] is the pure rule; [`PreferenceFilter`] is the seam the
//! pipeline calls through, so a local and a remote implementation are interchangeable.

pub mod remote;
pub mod service;

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::RemoteFilterError;
use crate::ingest::types::{FeedItem, RawSnapshot};

pub use remote::RemoteFilter;
pub use service::{FilterEnvelope, FilterService, FILTER_TOKEN_HEADER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Local,
    Remote,
}

impl FilterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Local => "local",
            FilterKind::Remote => "remote",
        }
    }
}

/// Case-folded preference set. Empty means "no filtering".
#[derive(Debug, Clone, Default)]
pub struct PreferenceMatcher {
    wanted: HashSet<String>,
}

impl PreferenceMatcher {
    pub fn new<S: AsRef<str>>(preferences: &[S]) -> Self {
        Self {
            wanted: preferences
                .iter()
                .map(|p| p.as_ref().to_lowercase())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.wanted.is_empty()
    }

    /// True iff some tag equals some preference, ignoring case. Untagged items never match.
    pub fn matches(&self, item: &FeedItem) -> bool {
        item.descriptive_tags()
            .iter()
            .any(|tag| self.wanted.contains(&tag.to_lowercase()))
    }
}

/// Keep items sharing at least one descriptive tag with `preferences`, in input order.
/// Empty preferences return `items` unchanged.
pub fn filter_by_preferences<S: AsRef<str>>(items: Vec<FeedItem>, preferences: &[S]) -> Vec<FeedItem> {
    let matcher = PreferenceMatcher::new(preferences);
    if matcher.is_empty() {
        return items;
    }
    items.into_iter().filter(|it| matcher.matches(it)).collect()
}

#[async_trait]
pub trait PreferenceFilter: Send + Sync {
    async fn apply(
        &self,
        snapshot: &RawSnapshot,
        preferences: &[String],
    ) -> Result<Vec<FeedItem>, RemoteFilterError>;

    fn kind(&self) -> FilterKind;
}

/// In-process filter; cannot fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFilter;

#[async_trait]
impl PreferenceFilter for LocalFilter {
    async fn apply(
        &self,
        snapshot: &RawSnapshot,
        preferences: &[String],
    ) -> Result<Vec<FeedItem>, RemoteFilterError> {
        Ok(filter_by_preferences(snapshot.items.clone(), preferences))
    }

    fn kind(&self) -> FilterKind {
        FilterKind::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: u32, tags: serde_json::Value) -> FeedItem {
        FeedItem::from_json(json!({ "id": id, "des_facet": tags })).unwrap()
    }

    #[test]
    fn tag_match_is_exact_not_substring() {
        let items = vec![item(1, json!(["Elections"])), item(2, json!(["Election"]))];
        let out = filter_by_preferences(items, &["election"]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].fields()["id"], json!(2));
    }

    #[test]
    fn preference_case_is_folded_too() {
        let items = vec![item(1, json!(["sports"]))];
        assert_eq!(filter_by_preferences(items, &["SPORTS"]).len(), 1);
    }

    #[test]
    fn non_string_tags_are_ignored() {
        let items = vec![item(1, json!([1, null, "Tech"])), item(2, json!({"x": 1}))];
        let out = filter_by_preferences(items, &["tech"]);
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn local_filter_matches_pure_function() {
        let items = vec![
            item(1, json!(["Art"])),
            item(2, json!([])),
            item(3, json!(["art", "Music"])),
        ];
        let snap = RawSnapshot::new(items.clone(), chrono::Utc::now());
        let prefs = vec!["ART".to_string()];
        let via_trait = LocalFilter.apply(&snap, &prefs).await.unwrap();
        assert_eq!(via_trait, filter_by_preferences(items, &prefs));
        assert_eq!(LocalFilter.kind(), FilterKind::Local);
    }
}
