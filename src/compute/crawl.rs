//! Catalog refresh: loads every staged artifact into the processed layer

use std::cell::Cell;

use chrono::Utc;

use crate::{
    artifact::{
        self,
        key::{TIMESTAMP_FORMAT, is_artifact_key},
    },
    compute::{ComputeError, ComputeJob, JobHandle, JobState, TerminalState},
    storage::ObjectStore,
    warehouse::{Warehouse, operations::ArtifactBatch},
};

/// Runs in-process, so `start` only returns once the load is done
pub struct CrawlJob<'a, S: ObjectStore + ?Sized> {
    store: &'a S,
    warehouse: &'a Warehouse,
    bucket: String,
    prefix: String,
    artifact_base: String,
    last_run: Cell<Option<TerminalState>>,
}

impl<'a, S: ObjectStore + ?Sized> CrawlJob<'a, S> {
    pub fn new(
        store: &'a S,
        warehouse: &'a Warehouse,
        bucket: &str,
        prefix: &str,
        artifact_base: &str,
    ) -> Self {
        Self {
            store,
            warehouse,
            bucket: bucket.to_string(),
            prefix: prefix.to_string(),
            artifact_base: artifact_base.to_string(),
            last_run: Cell::new(None),
        }
    }

    fn crawl(&self) -> Result<usize, ComputeError> {
        let keys = self
            .store
            .list(&self.bucket, &artifact::key::normalize_prefix(&self.prefix))?
            .into_iter()
            .filter(|key| is_artifact_key(key, &self.prefix, &self.artifact_base))
            .collect::<Vec<_>>();

        let batches = keys
            .into_iter()
            .map(|key| {
                let payload = self.store.get(&self.bucket, &key)?;
                let records = artifact::read_records(&payload).map_err(|source| {
                    ComputeError::Artifact {
                        key: key.clone(),
                        source,
                    }
                })?;
                Ok(ArtifactBatch { key, records })
            })
            .collect::<Result<Vec<_>, ComputeError>>()?;

        let rows = self.warehouse.replace_processed(&batches)?;
        log::info!(
            "crawled {} artifacts under {}/{}, {rows} rows loaded",
            batches.len(),
            self.bucket,
            self.prefix
        );
        Ok(rows)
    }
}

impl<S: ObjectStore + ?Sized> ComputeJob for CrawlJob<'_, S> {
    fn name(&self) -> &str {
        "crawl"
    }

    fn start(&self) -> Result<JobHandle, ComputeError> {
        let handle = JobHandle(format!("crawl-{}", Utc::now().format(TIMESTAMP_FORMAT)));
        self.last_run.set(None);
        self.crawl()?;
        self.last_run.set(Some(TerminalState::Succeeded));
        Ok(handle)
    }

    fn status(&self, handle: &JobHandle) -> Result<JobState, ComputeError> {
        self.last_run
            .get()
            .map(JobState::Terminal)
            .ok_or_else(|| ComputeError::UnknownRun {
                job: self.name().to_string(),
                handle: handle.clone(),
            })
    }
}
