//! Object store backed by a directory tree: `<root>/<bucket>/<key>`

use walkdir::WalkDir;

use std::path::{Component, Path, PathBuf};

use crate::storage::{ObjectLocation, ObjectStore, error::StorageError};

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn bucket_dir(&self, bucket: &str) -> Result<PathBuf, StorageError> {
        if bucket.is_empty() || !is_plain_relative(Path::new(bucket)) || bucket.contains('/') {
            return Err(StorageError::InvalidKey(bucket.to_string()));
        }
        Ok(self.root.join(bucket))
    }

    /// maps bucket and key to a path, rejecting anything that could escape the bucket
    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StorageError> {
        let key_path = Path::new(key);
        if key.is_empty() || key.ends_with('/') || !is_plain_relative(key_path) {
            return Err(StorageError::InvalidKey(format!("{bucket}/{key}")));
        }
        Ok(self.bucket_dir(bucket)?.join(key_path))
    }
}

fn is_plain_relative(path: &Path) -> bool {
    path.components().all(|c| matches!(c, Component::Normal(_)))
}

impl ObjectStore for LocalObjectStore {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<ObjectLocation, StorageError> {
        let path = self.object_path(bucket, key)?;
        let write_err = |source| StorageError::Write {
            key: key.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(&path, bytes).map_err(write_err)?;

        let uri = format!(
            "file://{}",
            std::path::absolute(&path).unwrap_or(path).to_string_lossy()
        );
        log::debug!("stored {} bytes at {uri}", bytes.len());

        Ok(ObjectLocation {
            bucket: bucket.to_string(),
            key: key.to_string(),
            uri,
        })
    }

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(bucket, key)?;
        std::fs::read(&path).map_err(|source| StorageError::Read {
            key: key.to_string(),
            source,
        })
    }

    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
        let bucket_dir = self.bucket_dir(bucket)?;
        if !bucket_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = WalkDir::new(&bucket_dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("skipping unreadable entry in bucket {bucket}: {err}");
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&bucket_dir).ok()?;
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                Some(key)
            })
            .filter(|key| key.starts_with(prefix))
            .collect::<Vec<_>>();

        keys.sort();
        Ok(keys)
    }
}
