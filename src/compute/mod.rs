//! Fire-and-monitor access to external compute: start a job, poll it until
//! it settles.

pub mod crawl;
pub mod remote;

use std::{
    fmt::Display,
    time::{Duration, Instant},
};

use thiserror::Error;

use crate::{artifact::ArtifactError, storage::error::StorageError, warehouse::error::WarehouseError};

/// Identifies one run of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle(pub String);

impl Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalState {
    Succeeded,
    Failed,
    Cancelled,
}

impl Display for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TerminalState::Succeeded => write!(f, "succeeded"),
            TerminalState::Failed => write!(f, "failed"),
            TerminalState::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// still going, with the state name the job reported
    Running(String),
    Terminal(TerminalState),
}

#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("job {job} did not finish within {waited:?}")]
    Timeout { job: String, waited: Duration },

    #[error("job {job} ended {state}")]
    Failed { job: String, state: TerminalState },

    #[error("job {job} has no run {handle}")]
    UnknownRun { job: String, handle: JobHandle },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to read artifact '{key}': {source}")]
    Artifact {
        key: String,
        #[source]
        source: ArtifactError,
    },

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error("compute request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("compute service returned status {status} for {url}")]
    Status { url: String, status: u16 },
}

impl ComputeError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ComputeError::Storage(e) => e.is_retryable(),
            ComputeError::Request(e) => e.is_timeout() || e.is_connect(),
            ComputeError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// An external job that can be started and polled
pub trait ComputeJob {
    fn name(&self) -> &str;

    fn start(&self) -> Result<JobHandle, ComputeError>;

    fn status(&self, handle: &JobHandle) -> Result<JobState, ComputeError>;
}

/// Polls `job` every `poll_interval` until it reaches a terminal state.
///
/// Fails with [`ComputeError::Timeout`] once `timeout` has elapsed without one.
pub fn wait_for_terminal_state<J: ComputeJob + ?Sized>(
    job: &J,
    handle: &JobHandle,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<TerminalState, ComputeError> {
    let started = Instant::now();
    loop {
        match job.status(handle)? {
            JobState::Terminal(state) => {
                log::info!("job {} run {handle} {state}", job.name());
                return Ok(state);
            }
            JobState::Running(detail) => {
                log::debug!("job {} run {handle} state = {detail}", job.name());
            }
        }

        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(ComputeError::Timeout {
                job: job.name().to_string(),
                waited: timeout,
            });
        }
        std::thread::sleep(poll_interval.min(timeout - elapsed));
    }
}

/// Starts `job` and waits for it, anything but success is an error
pub fn run_to_completion<J: ComputeJob + ?Sized>(
    job: &J,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<JobHandle, ComputeError> {
    let handle = job.start()?;
    log::info!("started job {} run {handle}", job.name());

    match wait_for_terminal_state(job, &handle, poll_interval, timeout)? {
        TerminalState::Succeeded => Ok(handle),
        state => Err(ComputeError::Failed {
            job: job.name().to_string(),
            state,
        }),
    }
}
