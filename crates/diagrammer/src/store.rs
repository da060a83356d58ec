//! Object storage.
//!
//! [`ObjectStore`] is the seam between the publishing pipeline and a
//! bucket. Both bundled stores refuse to overwrite an existing key.

use std::{
    fs::{self, OpenOptions},
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use indexmap::IndexMap;
use log::debug;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object `{bucket}/{key}` already exists")]
    AlreadyExists { bucket: String, key: String },

    #[error("object store I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("object store unavailable: {0}")]
    Unavailable(String),
}

/// A bucketed key-value store for uploaded objects.
pub trait ObjectStore: Send + Sync {
    /// Stores `bytes` under `bucket/key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::AlreadyExists`] if the key is taken.
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError>;

    /// Stores the contents of the file at `path` under `bucket/key`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be read, otherwise the
    /// errors of [`ObjectStore::put_object`].
    fn upload_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), StoreError> {
        let bytes = fs::read(path)?;
        self.put_object(bucket, key, &bytes, content_type)
    }
}

/// An object held by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-process store, used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<IndexMap<(String, String), StoredObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> MutexGuard<'_, IndexMap<(String, String), StoredObject>> {
        // A panic while holding the lock cannot leave the map half-written.
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns a copy of the object at `bucket/key`.
    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects()
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys of `bucket` in upload order.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects()
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Number of objects across all buckets.
    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }
}

impl ObjectStore for MemoryStore {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<(), StoreError> {
        let mut objects = self.objects();
        let id = (bucket.to_string(), key.to_string());
        if objects.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                bucket: id.0,
                key: id.1,
            });
        }
        objects.insert(
            id,
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        debug!(bucket = bucket, key = key, size = bytes.len(); "Object stored in memory");
        Ok(())
    }
}

/// Store writing objects to `<root>/<bucket>/<key>` on the local
/// filesystem. Content types are not persisted.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path an object is written to.
    ///
    /// # Errors
    ///
    /// Rejects keys and buckets that are empty or would escape the root.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let safe = |part: &str| {
            !part.is_empty()
                && part
                    .split('/')
                    .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
        };
        if !safe(bucket) || bucket.contains('/') || !safe(key) {
            return Err(StoreError::Unavailable(format!(
                "invalid object location `{bucket}/{key}`"
            )));
        }
        Ok(self.root.join(bucket).join(key))
    }
}

impl ObjectStore for FsStore {
    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<(), StoreError> {
        let path = self.object_path(bucket, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StoreError::AlreadyExists {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                });
            }
            Err(err) => return Err(err.into()),
        };
        file.write_all(bytes)?;
        debug!(bucket = bucket, key = key, size = bytes.len(); "Object written to disk");
        Ok(())
    }
}
