//! End-to-end run: fetch, transform, stage the artifact, refresh downstream
//! layers and reconcile them.
//!
//! Every stage reads what it needs from a [`PipelineContext`] filled in by the
//! stages before it, and every failure is tagged with the [`Stage`] it came from.

pub mod retry;

use std::fmt::Display;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

use crate::{
    artifact::{self, ArtifactError},
    catalog::{CatalogApi, error::CatalogError, fetch_rows},
    compute::{
        ComputeError, ComputeJob, JobHandle, TerminalState, crawl::CrawlJob, run_to_completion,
        wait_for_terminal_state,
    },
    config::Config,
    quality::{self, QualityError, ReconciliationSample},
    report::{self, ArtistCount, CategorySummary},
    storage::{ObjectStore, error::StorageError},
    transform::transform_rows,
    warehouse::{
        CountView, CuratedView, GroupCounts, ProcessedView, Warehouse, error::WarehouseError,
    },
};

use retry::{RetriedStatus, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetch,
    Transform,
    Upload,
    Crawl,
    RemoteJob,
    ProcessedCounts,
    RefreshGold,
    CuratedCounts,
    Reconcile,
}

impl Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
            Stage::Upload => "upload",
            Stage::Crawl => "crawl",
            Stage::RemoteJob => "remote_job",
            Stage::ProcessedCounts => "processed_counts",
            Stage::RefreshGold => "refresh_gold",
            Stage::CuratedCounts => "curated_counts",
            Stage::Reconcile => "reconcile",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum StageFailure {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Compute(#[from] ComputeError),

    #[error(transparent)]
    Warehouse(#[from] WarehouseError),

    #[error(transparent)]
    Quality(#[from] QualityError),
}

#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {failure}")]
pub struct PipelineError {
    pub stage: Stage,
    pub failure: StageFailure,
}

impl PipelineError {
    fn at<E: Into<StageFailure>>(stage: Stage) -> impl FnOnce(E) -> Self {
        move |err| Self {
            stage,
            failure: err.into(),
        }
    }
}

/// Where this run's artifact was staged
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedArtifact {
    pub bucket: String,
    pub key: String,
    pub uri: String,
}

/// State handed from stage to stage, doubles as the run report
#[derive(Debug, Clone, Serialize)]
pub struct PipelineContext {
    pub started_at: String,
    pub raw_rows: usize,
    pub transformed_rows: usize,
    pub artifact: Option<StagedArtifact>,
    pub length_summary: Vec<CategorySummary>,
    pub artists: Vec<ArtistCount>,
    pub processed: Option<GroupCounts>,
    pub curated: Option<GroupCounts>,
    pub reconciliation: Option<ReconciliationSample>,
    pub completed: Vec<Stage>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now().to_rfc3339(),
            raw_rows: 0,
            transformed_rows: 0,
            artifact: None,
            length_summary: Vec::new(),
            artists: Vec::new(),
            processed: None,
            curated: None,
            reconciliation: None,
            completed: Vec::new(),
        }
    }

    fn done(&mut self, stage: Stage) {
        log::info!("stage {stage} done");
        self.completed.push(stage);
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Pipeline<'a, S: ObjectStore + ?Sized> {
    config: &'a Config,
    store: &'a S,
    warehouse: &'a Warehouse,
    remote_job: Option<&'a dyn ComputeJob>,
    retry: RetryPolicy,
}

impl<'a, S: ObjectStore + ?Sized> Pipeline<'a, S> {
    pub fn new(config: &'a Config, store: &'a S, warehouse: &'a Warehouse) -> Self {
        Self {
            config,
            store,
            warehouse,
            remote_job: None,
            retry: RetryPolicy::new(&config.retry),
        }
    }

    /// Runs `job` between the crawl and the refresh of the curated layer
    pub fn with_remote_job(mut self, job: &'a dyn ComputeJob) -> Self {
        self.remote_job = Some(job);
        self
    }

    /// The full run, from catalog to reconciliation
    pub fn run<C: CatalogApi + ?Sized>(&self, catalog: &C) -> Result<PipelineContext, PipelineError> {
        let mut ctx = PipelineContext::new();
        self.extract(catalog, &mut ctx)?;
        self.validate(&mut ctx)?;
        Ok(ctx)
    }

    /// Fetches, transforms and stages one artifact
    pub fn extract<C: CatalogApi + ?Sized>(
        &self,
        catalog: &C,
        ctx: &mut PipelineContext,
    ) -> Result<StagedArtifact, PipelineError> {
        let artist_ids = self.config.artist_ids();
        let raw = self
            .retry
            .run(Stage::Fetch, || fetch_rows(catalog, &artist_ids))
            .map_err(PipelineError::at(Stage::Fetch))?;
        ctx.raw_rows = raw.len();
        log::info!("fetched {} rows for {} artists", raw.len(), artist_ids.len());
        ctx.done(Stage::Fetch);

        let ranked = transform_rows(&raw);
        let payload = artifact::write_rows(&ranked).map_err(PipelineError::at(Stage::Transform))?;
        ctx.transformed_rows = ranked.len();
        ctx.length_summary = report::length_summary(&ranked);
        ctx.artists = report::artist_counts(&ranked);
        log::info!(
            "transformed {} rows into {} unique tracks",
            ctx.raw_rows,
            ctx.transformed_rows
        );
        ctx.done(Stage::Transform);

        let storage = &self.config.storage;
        let key = artifact::artifact_key(
            &storage.prefix,
            &self.config.pipeline.artifact_base,
            Utc::now(),
        );
        let location = self
            .retry
            .run(Stage::Upload, || self.store.put(&storage.bucket, &key, &payload))
            .map_err(PipelineError::at(Stage::Upload))?;
        log::info!("uploaded {} bytes to {location}", payload.len());

        let staged = StagedArtifact {
            bucket: location.bucket,
            key: location.key,
            uri: location.uri,
        };
        ctx.artifact = Some(staged.clone());
        ctx.done(Stage::Upload);
        Ok(staged)
    }

    /// Refreshes the downstream layers from what is staged and reconciles them
    pub fn validate(&self, ctx: &mut PipelineContext) -> Result<ReconciliationSample, PipelineError> {
        let compute = &self.config.compute;
        let storage = &self.config.storage;

        let crawl = CrawlJob::new(
            self.store,
            self.warehouse,
            &storage.bucket,
            &storage.prefix,
            &self.config.pipeline.artifact_base,
        );
        self.retry
            .run(Stage::Crawl, || {
                run_to_completion(&crawl, compute.poll_interval(), compute.timeout())
            })
            .map_err(PipelineError::at(Stage::Crawl))?;
        ctx.done(Stage::Crawl);

        if let Some(job) = self.remote_job {
            let handle = self
                .run_remote_job(job)
                .map_err(PipelineError::at(Stage::RemoteJob))?;
            log::info!("remote job {} run {handle} succeeded", job.name());
            ctx.done(Stage::RemoteJob);
        }

        let processed = view_counts(&ProcessedView(self.warehouse))
            .map_err(PipelineError::at(Stage::ProcessedCounts))?;
        ctx.processed = Some(processed);
        ctx.done(Stage::ProcessedCounts);

        let albums = self
            .warehouse
            .refresh_gold()
            .map_err(PipelineError::at(Stage::RefreshGold))?;
        log::info!("curated layer rebuilt with {albums} albums");
        ctx.done(Stage::RefreshGold);

        let curated = view_counts(&CuratedView(self.warehouse))
            .map_err(PipelineError::at(Stage::CuratedCounts))?;
        ctx.curated = Some(curated);
        ctx.done(Stage::CuratedCounts);

        let sample = ReconciliationSample::new(processed, curated);
        ctx.reconciliation = Some(sample);
        quality::reconcile(&sample).map_err(PipelineError::at(Stage::Reconcile))?;
        ctx.done(Stage::Reconcile);

        Ok(sample)
    }
}

impl<S: ObjectStore + ?Sized> Pipeline<'_, S> {
    /// Triggers `job` once and follows that run. Only the trigger and single
    /// status polls are retried, a started run is never triggered again.
    fn run_remote_job(&self, job: &dyn ComputeJob) -> Result<JobHandle, ComputeError> {
        let compute = &self.config.compute;
        let handle = self.retry.run(Stage::RemoteJob, || job.start())?;
        log::info!("started job {} run {handle}", job.name());

        let polled = RetriedStatus::new(job, &self.retry);
        match wait_for_terminal_state(&polled, &handle, compute.poll_interval(), compute.timeout())? {
            TerminalState::Succeeded => Ok(handle),
            state => Err(ComputeError::Failed {
                job: job.name().to_string(),
                state,
            }),
        }
    }
}

fn view_counts<V: CountView>(view: &V) -> Result<GroupCounts, WarehouseError> {
    let counts = view.counts()?;
    log::info!(
        "{} view: {} rows/tracks, {} albums",
        view.name(),
        counts.metric,
        counts.albums
    );
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use tempfile::TempDir;

    use crate::{
        artifact::{FIELD_NAMES, read_records},
        catalog::fake::FakeCatalog,
        compute::{ComputeError, TerminalState, fake::ScriptedJob},
        config::{Config, Database},
        quality::QualityError,
        storage::{ObjectLocation, ObjectStore, error::StorageError, fs::LocalObjectStore},
        warehouse::{GroupCounts, Warehouse},
    };

    use super::{Pipeline, PipelineContext, Stage, StageFailure};

    const CONFIG: &str = r#"
version = 1

[catalog]
client_id = "id"
client_secret = "secret"

[pipeline]
artist_ids = ["a1", "a2"]
artifact_base = "tracks_transformed"

[storage]
root = "unused"
bucket = "data"
prefix = "spotify/processed"

[warehouse]
in_memory = true

[compute]
poll_interval_secs = 0
timeout_secs = 5

[retry]
max_attempts = 3
initial_backoff_secs = 0
backoff_multiplier = 2.0
max_backoff_secs = 0
"#;

    fn config() -> Config {
        toml::from_str(CONFIG).unwrap()
    }

    fn warehouse() -> Warehouse {
        Warehouse::open(&Database {
            in_memory: true,
            path: None,
        })
        .unwrap()
    }

    fn catalog() -> FakeCatalog {
        FakeCatalog::default()
            .with_artist("a1", "First", &[("al1", "Album One"), ("al2", "Album Two")])
            .with_artist("a2", "Second", &[("al3", "Album Three"), ("al4", "Empty")])
            .with_tracks("al1", &[("t1", 120000), ("t2", 360000), ("t3", 200000)])
            .with_tracks("al2", &[("t4", 180000)])
            // t1 shows up on a compilation too, first occurrence wins
            .with_tracks("al3", &[("t5", 300000), ("t1", 120000)])
    }

    /// Fails the first `failures` writes with a transient error
    struct FlakyStore {
        inner: LocalObjectStore,
        failures: Cell<usize>,
    }

    impl ObjectStore for FlakyStore {
        fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> Result<ObjectLocation, StorageError> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(StorageError::Write {
                    key: key.to_string(),
                    source: std::io::Error::other("connection reset"),
                });
            }
            self.inner.put(bucket, key, bytes)
        }

        fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>, StorageError> {
            self.inner.get(bucket, key)
        }

        fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<String>, StorageError> {
            self.inner.list(bucket, prefix)
        }
    }

    #[test]
    fn full_run_stages_artifact_and_reconciles() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalObjectStore::new(tmp.path());
        let warehouse = warehouse();
        let config = config();

        let ctx = Pipeline::new(&config, &store, &warehouse).run(&catalog())?;

        assert_eq!(ctx.raw_rows, 6);
        assert_eq!(ctx.transformed_rows, 5);
        let artifact = ctx.artifact.as_ref().unwrap();
        assert!(artifact.key.starts_with("spotify/processed/tracks_transformed_"));
        assert!(artifact.key.ends_with(".csv"));
        assert!(artifact.uri.starts_with("file://"));

        let records = read_records(&store.get("data", &artifact.key)?)?;
        assert_eq!(records.len(), 5);
        let one = records.iter().find(|r| r.track_id == "t1").unwrap();
        assert_eq!(one.album_name.as_deref(), Some("Album One"));
        assert_eq!(one.album_track_count, Some(3));
        assert_eq!(one.album_popularity_rank, Some(1));

        assert_eq!(ctx.processed, Some(GroupCounts { metric: 5, albums: 3 }));
        assert_eq!(ctx.curated, Some(GroupCounts { metric: 5, albums: 3 }));
        let sample = ctx.reconciliation.unwrap();
        assert_eq!(sample.downstream_album_count, sample.upstream_album_count);
        assert_eq!(ctx.completed.last(), Some(&Stage::Reconcile));
        assert!(!ctx.completed.contains(&Stage::RemoteJob));
        Ok(())
    }

    #[test]
    fn empty_catalog_stages_header_only_artifact_then_fails_reconciliation() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalObjectStore::new(tmp.path());
        let warehouse = warehouse();
        let config = config();
        let catalog = FakeCatalog::default()
            .with_artist("a1", "First", &[])
            .with_artist("a2", "Second", &[]);

        let pipeline = Pipeline::new(&config, &store, &warehouse);
        let mut ctx = PipelineContext::new();
        let staged = pipeline.extract(&catalog, &mut ctx)?;

        let payload = String::from_utf8(store.get("data", &staged.key)?)?;
        assert_eq!(payload, format!("{}\n", FIELD_NAMES.join(",")));

        let err = pipeline.validate(&mut ctx).unwrap_err();
        assert_eq!(err.stage, Stage::Reconcile);
        assert!(matches!(
            err.failure,
            StageFailure::Quality(QualityError::EmptyCuratedDataset { upstream: 0 })
        ));
        Ok(())
    }

    #[test]
    fn failing_stage_is_reported() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalObjectStore::new(tmp.path());
        let warehouse = warehouse();
        let config = config();
        let catalog = FakeCatalog::default().with_artist("a1", "First", &[]);

        let err = Pipeline::new(&config, &store, &warehouse)
            .run(&catalog)
            .unwrap_err();

        assert_eq!(err.stage, Stage::Fetch);
        assert_eq!(
            err.to_string(),
            "stage `fetch` failed: catalog returned status 404 for /artists/a2"
        );
        assert!(store.list("data", "")?.is_empty());
        Ok(())
    }

    #[test]
    fn transient_upload_failure_is_retried() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = FlakyStore {
            inner: LocalObjectStore::new(tmp.path()),
            failures: Cell::new(2),
        };
        let warehouse = warehouse();
        let config = config();

        let ctx = Pipeline::new(&config, &store, &warehouse).run(&catalog())?;

        assert_eq!(store.failures.get(), 0);
        assert!(ctx.artifact.is_some());
        assert_eq!(ctx.completed.last(), Some(&Stage::Reconcile));
        Ok(())
    }

    #[test]
    fn upload_gives_up_after_max_attempts() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = FlakyStore {
            inner: LocalObjectStore::new(tmp.path()),
            failures: Cell::new(10),
        };
        let warehouse = warehouse();
        let config = config();

        let err = Pipeline::new(&config, &store, &warehouse)
            .run(&catalog())
            .unwrap_err();

        assert_eq!(err.stage, Stage::Upload);
        assert!(matches!(err.failure, StageFailure::Storage(StorageError::Write { .. })));
        assert_eq!(store.failures.get(), 7);
        Ok(())
    }

    #[test]
    fn remote_job_runs_between_crawl_and_refresh() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalObjectStore::new(tmp.path());
        let warehouse = warehouse();
        let config = config();
        let job = ScriptedJob::new(2, Some(TerminalState::Succeeded));

        let ctx = Pipeline::new(&config, &store, &warehouse)
            .with_remote_job(&job)
            .run(&catalog())?;

        let crawl = ctx.completed.iter().position(|s| *s == Stage::Crawl);
        let remote = ctx.completed.iter().position(|s| *s == Stage::RemoteJob);
        let refresh = ctx.completed.iter().position(|s| *s == Stage::RefreshGold);
        assert!(crawl < remote && remote < refresh);
        assert_eq!(job.started.borrow().len(), 1);
        Ok(())
    }

    #[test]
    fn transient_status_error_does_not_trigger_the_job_again() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalObjectStore::new(tmp.path());
        let warehouse = warehouse();
        let config = config();
        let job = ScriptedJob::new(1, Some(TerminalState::Succeeded)).with_status_errors(1);

        let ctx = Pipeline::new(&config, &store, &warehouse)
            .with_remote_job(&job)
            .run(&catalog())?;

        assert_eq!(job.started.borrow().len(), 1);
        assert_eq!(job.status_errors.get(), 0);
        assert!(ctx.completed.contains(&Stage::RemoteJob));
        Ok(())
    }

    #[test]
    fn persistent_status_errors_fail_the_stage() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalObjectStore::new(tmp.path());
        let warehouse = warehouse();
        let config = config();
        let job = ScriptedJob::new(0, Some(TerminalState::Succeeded)).with_status_errors(10);

        let err = Pipeline::new(&config, &store, &warehouse)
            .with_remote_job(&job)
            .run(&catalog())
            .unwrap_err();

        assert_eq!(err.stage, Stage::RemoteJob);
        assert!(matches!(
            err.failure,
            StageFailure::Compute(ComputeError::Status { status: 503, .. })
        ));
        assert_eq!(job.started.borrow().len(), 1);
        // max_attempts polls, no more
        assert_eq!(job.status_errors.get(), 7);
        Ok(())
    }

    #[test]
    fn failed_remote_job_stops_the_run() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalObjectStore::new(tmp.path());
        let warehouse = warehouse();
        let config = config();
        let job = ScriptedJob::new(0, Some(TerminalState::Failed));

        let err = Pipeline::new(&config, &store, &warehouse)
            .with_remote_job(&job)
            .run(&catalog())
            .unwrap_err();

        assert_eq!(err.stage, Stage::RemoteJob);
        // a failed run is final, it is not triggered again
        assert_eq!(job.started.borrow().len(), 1);
        assert_eq!(warehouse.curated_counts()?, GroupCounts { metric: 0, albums: 0 });
        Ok(())
    }

    #[test]
    fn report_serializes_to_json() -> anyhow::Result<()> {
        let tmp = TempDir::new()?;
        let store = LocalObjectStore::new(tmp.path());
        let warehouse = warehouse();
        let config = config();

        let ctx = Pipeline::new(&config, &store, &warehouse).run(&catalog())?;
        let json: serde_json::Value = serde_json::to_value(&ctx)?;

        assert_eq!(json["transformed_rows"], 5);
        assert_eq!(json["processed"]["albums"], 3);
        assert_eq!(json["completed"][0], "fetch");
        assert_eq!(json["artists"][0]["artist"], "First");
        Ok(())
    }
}
