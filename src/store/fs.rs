use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{content_type_for, validate_key, ObjectMeta, ObjectStore, StoreError, StoredObject};

const TMP_SUFFIX: &str = ".tmp";

/// Bucket backed by a directory tree: key `raw/news-x.json` lives at `{root}/{bucket}/raw/news-x.json`.
/// Content type is derived from the key extension; modification time comes from file metadata.
#[derive(Debug, Clone)]
pub struct LocalFsObjectStore {
    bucket: String,
    dir: PathBuf,
}

impl LocalFsObjectStore {
    /// Open (and create if needed) the bucket directory under `root`.
    pub fn new(root: impl AsRef<Path>, bucket: impl Into<String>) -> Result<Self, StoreError> {
        let bucket = bucket.into();
        validate_key(&bucket)?;
        let dir = root.as_ref().join(&bucket);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { bucket, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_key(key)?;
        Ok(key.split('/').fold(self.dir.clone(), |p, seg| p.join(seg)))
    }
}

fn modified_utc(meta: &std::fs::Metadata) -> io::Result<DateTime<Utc>> {
    meta.modified().map(DateTime::<Utc>::from)
}

#[async_trait]
impl ObjectStore for LocalFsObjectStore {
    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<ObjectMeta, StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // write-then-rename so readers never observe a half-written object;
        // one temp file per write, concurrent puts of a key must not share it
        let mut tmp = path.clone().into_os_string();
        tmp.push(format!(".{}{TMP_SUFFIX}", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);
        let mut f = fs::File::create(&tmp).await?;
        f.write_all(&body).await?;
        f.flush().await?;
        drop(f);
        fs::rename(&tmp, &path).await?;

        let meta = fs::metadata(&path).await?;
        Ok(ObjectMeta {
            key: key.to_string(),
            last_modified: modified_utc(&meta)?,
        })
    }

    async fn get(&self, key: &str) -> Result<StoredObject, StoreError> {
        let path = self.path_for(key)?;
        let body = match fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::Missing(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        let meta = fs::metadata(&path).await?;
        Ok(StoredObject {
            key: key.to_string(),
            body,
            content_type: content_type_for(key).to_string(),
            last_modified: modified_utc(&meta)?,
        })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        let mut out = Vec::new();
        let mut pending: Vec<(PathBuf, String)> = vec![(self.dir.clone(), String::new())];

        while let Some((dir, rel)) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let key = if rel.is_empty() {
                    name.clone()
                } else {
                    format!("{rel}/{name}")
                };
                let meta = entry.metadata().await?;
                if meta.is_dir() {
                    // only descend where the prefix can still match
                    if key.starts_with(prefix) || prefix.starts_with(&format!("{key}/")) {
                        pending.push((entry.path(), key));
                    }
                    continue;
                }
                if name.ends_with(TMP_SUFFIX) || !key.starts_with(prefix) {
                    continue;
                }
                out.push(ObjectMeta {
                    key,
                    last_modified: modified_utc(&meta)?,
                });
            }
        }

        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }
}
