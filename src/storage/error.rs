use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write object '{key}': {source}")]
    Write {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read object '{key}': {source}")]
    Read {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid object address '{0}'")]
    InvalidKey(String),
}

impl StorageError {
    /// reads and writes can be retried, a malformed address never succeeds
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::Write { .. } => true,
            StorageError::Read { source, .. } => source.kind() != std::io::ErrorKind::NotFound,
            StorageError::InvalidKey(_) => false,
        }
    }
}
