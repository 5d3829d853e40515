use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{validate_key, ObjectMeta, ObjectStore, StoreError, StoredObject};

/// Process-local bucket. Keys are kept sorted, so listings are stable.
#[derive(Debug)]
pub struct InMemoryObjectStore {
    bucket: String,
    objects: RwLock<BTreeMap<String, StoredObject>>,
    unavailable: AtomicBool,
    read_only: AtomicBool,
}

impl InMemoryObjectStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: RwLock::new(BTreeMap::new()),
            unavailable: AtomicBool::new(false),
            read_only: AtomicBool::new(false),
        }
    }

    /// Insert with an explicit modification time (seeding, replaying an export).
    pub fn insert_at(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        last_modified: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        validate_key(key)?;
        self.write().insert(
            key.to_string(),
            StoredObject {
                key: key.to_string(),
                body,
                content_type: content_type.to_string(),
                last_modified,
            },
        );
        Ok(())
    }

    /// Simulate an outage: every operation fails with `Unavailable` while set.
    pub fn set_unavailable(&self, down: bool) {
        self.unavailable.store(down, Ordering::SeqCst);
    }

    /// Reject writes while reads keep working (quota or permission failures).
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn check_up(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "bucket {} is offline",
                self.bucket
            )));
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, StoredObject>> {
        match self.objects.read() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, StoredObject>> {
        match self.objects.write() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<ObjectMeta, StoreError> {
        self.check_up()?;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "bucket {} rejects writes",
                self.bucket
            )));
        }
        let now = Utc::now();
        self.insert_at(key, body, content_type, now)?;
        Ok(ObjectMeta {
            key: key.to_string(),
            last_modified: now,
        })
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        self.check_up()?;
        self.read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::Missing(key.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        self.check_up()?;
        Ok(self
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, o)| ObjectMeta {
                key: k.clone(),
                last_modified: o.last_modified,
            })
            .collect())
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
