use anyhow::Context;
use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub version: u32,
    pub catalog: CatalogConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
    pub warehouse: Database,
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path}"))?;
        toml::from_str(&contents).with_context(|| "Failed to parse config TOML")
    }

    /// Checks the options every run needs before anything touches the network
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.pipeline.artist_ids.iter().all(|id| id.trim().is_empty()) {
            return invalid("pipeline.artist_ids must list at least one artist");
        }
        if self.catalog.client_id.is_empty() || self.catalog.client_secret.is_empty() {
            return invalid("catalog credentials (client_id, client_secret) are required");
        }
        self.validate_targets()
    }

    /// Checks only what the downstream stages need, no catalog access involved
    pub fn validate_targets(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.storage.bucket.is_empty() {
            return invalid("storage.bucket must not be empty");
        }
        if self.pipeline.artifact_base.is_empty() {
            return invalid("pipeline.artifact_base must not be empty");
        }
        if !self.warehouse.in_memory && self.warehouse.path.is_none() {
            return invalid("warehouse.path is required unless warehouse.in_memory is set");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        Ok(())
    }

    /// artist ids with surrounding whitespace and blanks removed
    pub fn artist_ids(&self) -> Vec<String> {
        self.pipeline
            .artist_ids
            .iter()
            .map(|id| id.trim())
            .filter(|id| !id.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    #[serde(default = "default_token_url")]
    pub token_url: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_album_limit")]
    pub album_limit: u32,
}

fn default_token_url() -> String {
    "https://accounts.spotify.com/api/token".to_string()
}

fn default_api_base() -> String {
    "https://api.spotify.com/v1".to_string()
}

fn default_album_limit() -> u32 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub artist_ids: Vec<String>,
    #[serde(default = "default_artifact_base")]
    pub artifact_base: String,
}

fn default_artifact_base() -> String {
    "tracks_transformed".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// directory holding one sub-directory per bucket
    pub root: PathBuf,
    pub bucket: String,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Database {
    pub in_memory: bool,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ComputeConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub remote_job: Option<RemoteJobConfig>,
}

impl ComputeConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            timeout_secs: default_timeout_secs(),
            remote_job: None,
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_timeout_secs() -> u64 {
    900
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteJobConfig {
    pub host: String,
    pub token: String,
    pub job_id: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_secs: 5,
            backoff_multiplier: 2.0,
            max_backoff_secs: 300,
        }
    }
}
