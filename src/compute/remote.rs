//! Remote batch job triggered over HTTP (Databricks Jobs API 2.1 shape)

use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, de::DeserializeOwned};

use crate::{
    compute::{ComputeError, ComputeJob, JobHandle, JobState, TerminalState},
    config::RemoteJobConfig,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteJob {
    client: Client,
    host: String,
    token: String,
    job_id: u64,
}

#[derive(Deserialize)]
struct RunNowResponse {
    run_id: u64,
}

#[derive(Deserialize)]
struct RunResponse {
    state: RunState,
}

#[derive(Debug, Deserialize)]
struct RunState {
    life_cycle_state: String,
    #[serde(default)]
    result_state: Option<String>,
}

impl RemoteJob {
    pub fn new(config: &RemoteJobConfig) -> Result<Self, ComputeError> {
        Ok(Self {
            client: Client::builder().timeout(REQUEST_TIMEOUT).build()?,
            host: config.host.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            job_id: config.job_id,
        })
    }

    fn checked_json<T: DeserializeOwned>(
        url: &str,
        response: reqwest::blocking::Response,
    ) -> Result<T, ComputeError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ComputeError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.json()?)
    }
}

/// maps the service's life-cycle and result states onto [`JobState`]
fn job_state(state: &RunState) -> JobState {
    match state.life_cycle_state.as_str() {
        "TERMINATED" => match state.result_state.as_deref() {
            Some("SUCCESS") => JobState::Terminal(TerminalState::Succeeded),
            Some("CANCELED") => JobState::Terminal(TerminalState::Cancelled),
            _ => JobState::Terminal(TerminalState::Failed),
        },
        "SKIPPED" => JobState::Terminal(TerminalState::Cancelled),
        "INTERNAL_ERROR" => JobState::Terminal(TerminalState::Failed),
        other => JobState::Running(other.to_string()),
    }
}

impl ComputeJob for RemoteJob {
    fn name(&self) -> &str {
        "remote_job"
    }

    fn start(&self) -> Result<JobHandle, ComputeError> {
        let url = format!("{}/api/2.1/jobs/run-now", self.host);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "job_id": self.job_id }))
            .send()?;

        let run: RunNowResponse = Self::checked_json(&url, response)?;
        Ok(JobHandle(run.run_id.to_string()))
    }

    fn status(&self, handle: &JobHandle) -> Result<JobState, ComputeError> {
        let url = format!("{}/api/2.1/jobs/runs/get?run_id={handle}", self.host);
        let response = self.client.get(&url).bearer_auth(&self.token).send()?;

        let run: RunResponse = Self::checked_json(&url, response)?;
        Ok(job_state(&run.state))
    }
}
