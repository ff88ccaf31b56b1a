use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("authentication failed with status {status}: {message}")]
    Authentication { status: u16, message: String },

    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog returned status {status} for {url}")]
    Status { url: String, status: u16 },
}

impl CatalogError {
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Request(e) => e.is_timeout() || e.is_connect(),
            CatalogError::Status { status, .. } => *status == 429 || *status >= 500,
            CatalogError::Configuration(_) | CatalogError::Authentication { .. } => false,
        }
    }
}
