//! Object storage the artifacts are staged in

use std::fmt::Display;

pub mod error;
pub mod fs;

use error::StorageError;

/// Where an object ended up, as reported by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
    pub uri: String,
}

impl Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Bucket/key addressed blob storage
pub trait ObjectStore {
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<ObjectLocation, StorageError>;

    fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// keys in `bucket` starting with `prefix`, sorted
    fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError>;
}
