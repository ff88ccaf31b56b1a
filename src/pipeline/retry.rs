//! Bounded retry with exponential backoff around external calls

use std::{fmt::Display, time::Duration};

use crate::{
    catalog::error::CatalogError,
    compute::{ComputeError, ComputeJob, JobHandle, JobState},
    config::RetryConfig,
    storage::error::StorageError,
};

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for CatalogError {
    fn is_retryable(&self) -> bool {
        CatalogError::is_retryable(self)
    }
}

impl Retryable for StorageError {
    fn is_retryable(&self) -> bool {
        StorageError::is_retryable(self)
    }
}

impl Retryable for ComputeError {
    fn is_retryable(&self) -> bool {
        ComputeError::is_retryable(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// total attempts including the first one
    pub max_attempts: u32,
    pub initial_backoff_secs: u64,
    pub max_backoff_secs: u64,
    pub backoff_multiplier: f64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff_secs: config.initial_backoff_secs,
            max_backoff_secs: config.max_backoff_secs,
            backoff_multiplier: config.backoff_multiplier,
        }
    }

    /// `initial_backoff * multiplier^retry`, capped at `max_backoff_secs`
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let secs = self.initial_backoff_secs as f64 * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_backoff_secs as f64).max(0.0))
    }

    pub fn should_retry<E: Retryable>(&self, error: &E, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or runs
    /// out of attempts. The last error is returned as is.
    pub fn run<T, E, F>(&self, what: impl Display, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if self.should_retry(&err, attempt) => {
                    let wait = self.backoff(attempt - 1);
                    log::warn!(
                        "{what} failed (attempt {attempt}/{}), retrying in {wait:?}: {err}",
                        self.max_attempts
                    );
                    std::thread::sleep(wait);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Wraps a job so every status poll is retried on its own.
///
/// `start` is passed through untouched.
pub struct RetriedStatus<'a, J: ComputeJob + ?Sized> {
    job: &'a J,
    retry: &'a RetryPolicy,
}

impl<'a, J: ComputeJob + ?Sized> RetriedStatus<'a, J> {
    pub fn new(job: &'a J, retry: &'a RetryPolicy) -> Self {
        Self { job, retry }
    }
}

impl<J: ComputeJob + ?Sized> ComputeJob for RetriedStatus<'_, J> {
    fn name(&self) -> &str {
        self.job.name()
    }

    fn start(&self) -> Result<JobHandle, ComputeError> {
        self.job.start()
    }

    fn status(&self, handle: &JobHandle) -> Result<JobState, ComputeError> {
        self.retry.run(
            format_args!("status of job {} run {handle}", self.job.name()),
            || self.job.status(handle),
        )
    }
}
