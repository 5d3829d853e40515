//! Object store abstraction: string-keyed blobs with put/get/list-by-prefix.
//!
//! The pipeline treats storage as an external collaborator; the two backends here
//! (in-memory and local filesystem) cover tests, local runs, and single-node deploys.

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub use fs::LocalFsObjectStore;
pub use memory::InMemoryObjectStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {0}")]
    Missing(String),
    #[error("invalid object key: {0:?}")]
    InvalidKey(String),
    #[error("object store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
    pub last_modified: DateTime<Utc>,
}

/// One bucket of an object store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<ObjectMeta, StoreError>;
    async fn get(&self, key: &str) -> Result<StoredObject, StoreError>;
    /// All objects whose key starts with `prefix`, in a backend-stable order.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError>;
    fn bucket(&self) -> &str;
}

/// Reject keys that could escape the bucket or that no backend can represent.
pub(crate) fn validate_key(key: &str) -> Result<(), StoreError> {
    let bad = key.is_empty()
        || key.starts_with('/')
        || key.contains('\\')
        || key
            .split('/')
            .any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Best-effort content type from a key's extension.
pub(crate) fn content_type_for(key: &str) -> &'static str {
    match key.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "json" => "application/json",
        Some(ext) if ext == "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_validation() {
        assert!(validate_key("raw/news-2024-01-01-00-00-00.json").is_ok());
        for bad in ["", "/abs", "raw//x", "raw/../etc", "./x", "a\\b", "raw/"] {
            assert!(validate_key(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn content_type_guess() {
        assert_eq!(content_type_for("raw/a.JSON"), "application/json");
        assert_eq!(content_type_for("raw/a"), "application/octet-stream");
    }
}
