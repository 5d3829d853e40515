// src/filter/service.rs
//! Filtering service: the server side of [`RemoteFilter`](super::RemoteFilter).
//! Reads the newest raw snapshot from the shared store, filters it, and answers
//! with a `{statusCode, body}` envelope whose body is a JSON-encoded string.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::filter_by_preferences;
use crate::error::LoadError;
use crate::publish::SnapshotPublisher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterEnvelope {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl FilterEnvelope {
    fn error(status_code: u16, message: &str) -> Self {
        Self {
            status_code,
            body: serde_json::json!({ "error": message }).to_string(),
        }
    }
}

/// Header carrying the shared secret between [`RemoteFilter`](super::RemoteFilter)
/// and the service endpoint.
pub const FILTER_TOKEN_HEADER: &str = "X-Filter-Token";

#[derive(Clone)]
pub struct FilterService {
    publisher: SnapshotPublisher,
    write_processed: bool,
    token: Option<String>,
}

impl FilterService {
    pub fn new(publisher: SnapshotPublisher, write_processed: bool) -> Self {
        Self {
            publisher,
            write_processed,
            token: None,
        }
    }

    /// Shared secret callers must present. Without one the endpoint stays closed.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.token.is_some()
    }

    /// Whether `presented` matches the configured secret.
    pub fn accepts(&self, presented: Option<&str>) -> bool {
        match (self.token.as_deref(), presented) {
            (Some(expected), Some(given)) => constant_time_eq(expected.as_bytes(), given.as_bytes()),
            _ => false,
        }
    }

    pub async fn handle(&self, preferences: &[String]) -> FilterEnvelope {
        tracing::info!(target: "filter", preferences = ?preferences, "filter request");

        let raw = match self.publisher.fetch_latest_raw().await {
            Ok(items) => items,
            Err(LoadError::NotFound(nf)) => {
                tracing::warn!(target: "filter", "no raw snapshot stored yet");
                return FilterEnvelope::error(404, &nf.to_string());
            }
            Err(e) => {
                tracing::error!(target: "filter", error = %e, "loading raw snapshot failed");
                return FilterEnvelope::error(500, &e.to_string());
            }
        };
        let total = raw.len();
        let kept = filter_by_preferences(raw, preferences);

        if self.write_processed {
            // a lost processed copy does not invalidate the answer
            if let Err(e) = self.publisher.publish_processed(&kept, Utc::now()).await {
                tracing::warn!(target: "filter", error = %e, "processed copy not stored");
            }
        }

        match serde_json::to_string(&kept) {
            Ok(body) => {
                tracing::info!(target: "filter", total, kept = kept.len(), "filtered snapshot");
                FilterEnvelope {
                    status_code: 200,
                    body,
                }
            }
            Err(e) => FilterEnvelope::error(500, &e.to_string()),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
