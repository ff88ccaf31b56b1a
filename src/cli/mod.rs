use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::artifact;
use crate::catalog::client::HttpCatalogClient;
use crate::compute::remote::RemoteJob;
use crate::config::Config;
use crate::domain::track::RankedRow;
use crate::pipeline::{Pipeline, PipelineContext};
use crate::quality::{self, ReconciliationSample};
use crate::report;
use crate::storage::fs::LocalObjectStore;
use crate::transform::transform_rows;
use crate::warehouse::{GroupCounts, Warehouse};

#[derive(Parser)]
#[command(name = "catalog-etl")]
#[command(version = "0.1")]
#[command(about = "Music catalog batch ETL with cross-layer reconciliation")]
pub struct Cli {
    /// Path to the config TOML file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Catalog API client id, overrides the config file
    #[arg(long, env = "CATALOG_CLIENT_ID", hide_env_values = true)]
    pub client_id: Option<String>,

    /// Catalog API client secret, overrides the config file
    #[arg(long, env = "CATALOG_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the whole pipeline, from catalog to reconciliation
    Run {
        /// Print the run report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fetch, transform and stage one artifact
    Extract,
    /// Transform a local raw CSV export into an artifact
    Transform { input: PathBuf, output: PathBuf },
    /// Refresh the downstream layers from staged artifacts and reconcile them
    Validate,
    /// Check the subset rule for two album counts
    Reconcile {
        #[arg(long)]
        processed_albums: u64,
        #[arg(long)]
        curated_albums: u64,
    },
}

/// Entrypoint for CLI
pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Run { json } => {
            let cfg = load_config(&cli)?;
            cfg.validate()?;
            let (store, warehouse) = open_targets(&cfg)?;
            let catalog = HttpCatalogClient::connect(&cfg.catalog)?;
            let remote = cfg.compute.remote_job.as_ref().map(RemoteJob::new).transpose()?;

            let mut pipeline = Pipeline::new(&cfg, &store, &warehouse);
            if let Some(job) = &remote {
                pipeline = pipeline.with_remote_job(job);
            }
            let ctx = pipeline.run(&catalog)?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&ctx)?);
            } else {
                print_report(&ctx);
            }
        }

        Commands::Extract => {
            let cfg = load_config(&cli)?;
            cfg.validate()?;
            let (store, warehouse) = open_targets(&cfg)?;
            let catalog = HttpCatalogClient::connect(&cfg.catalog)?;

            let mut ctx = PipelineContext::new();
            let staged = Pipeline::new(&cfg, &store, &warehouse).extract(&catalog, &mut ctx)?;

            println!(
                "Staged {} tracks ({} fetched) at {}",
                ctx.transformed_rows, ctx.raw_rows, staged.uri
            );
        }

        Commands::Transform { input, output } => {
            let rows = transform_file(input, output)?;
            println!(
                "Transformed {} tracks into {}",
                rows.len(),
                output.to_string_lossy()
            );
            for line in report::length_summary(&rows) {
                println!("  {line}");
            }
        }

        Commands::Validate => {
            let cfg = load_config(&cli)?;
            cfg.validate_targets()?;
            let (store, warehouse) = open_targets(&cfg)?;
            let remote = cfg.compute.remote_job.as_ref().map(RemoteJob::new).transpose()?;

            let mut pipeline = Pipeline::new(&cfg, &store, &warehouse);
            if let Some(job) = &remote {
                pipeline = pipeline.with_remote_job(job);
            }
            let mut ctx = PipelineContext::new();
            let sample = pipeline.validate(&mut ctx)?;

            println!(
                "Reconciliation passed: {} curated albums within {} processed albums",
                sample.downstream_album_count, sample.upstream_album_count
            );
        }

        Commands::Reconcile {
            processed_albums,
            curated_albums,
        } => {
            let sample = ReconciliationSample::new(
                GroupCounts {
                    metric: 0,
                    albums: *processed_albums,
                },
                GroupCounts {
                    metric: 0,
                    albums: *curated_albums,
                },
            );
            quality::reconcile(&sample)?;
            println!("Reconciliation passed: {curated_albums} <= {processed_albums}");
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut cfg = Config::load(&cli.config.to_string_lossy())?;
    if let Some(id) = &cli.client_id {
        cfg.catalog.client_id = id.clone();
    }
    if let Some(secret) = &cli.client_secret {
        cfg.catalog.client_secret = secret.clone();
    }
    Ok(cfg)
}

fn open_targets(cfg: &Config) -> anyhow::Result<(LocalObjectStore, Warehouse)> {
    let store = LocalObjectStore::new(&cfg.storage.root);
    let warehouse = Warehouse::open(&cfg.warehouse).context("Failed to open warehouse")?;
    Ok((store, warehouse))
}

fn transform_file(input: &Path, output: &Path) -> anyhow::Result<Vec<RankedRow>> {
    let file = std::fs::File::open(input)
        .with_context(|| format!("Failed to open {}", input.to_string_lossy()))?;
    let raw = artifact::read_raw_rows(file)
        .with_context(|| format!("Failed to read raw rows from {}", input.to_string_lossy()))?;

    let rows = transform_rows(&raw);
    let payload = artifact::write_rows(&rows)?;
    std::fs::write(output, payload)
        .with_context(|| format!("Failed to write {}", output.to_string_lossy()))?;

    log::info!("transformed {} raw rows into {}", raw.len(), rows.len());
    Ok(rows)
}

fn print_report(ctx: &PipelineContext) {
    println!("Run started at {}", ctx.started_at);
    println!(
        "Fetched {} rows, {} unique tracks",
        ctx.raw_rows, ctx.transformed_rows
    );
    if let Some(artifact) = &ctx.artifact {
        println!("Artifact: {}", artifact.uri);
    }

    println!("Length categories:");
    for line in &ctx.length_summary {
        println!("  {line}");
    }
    println!("Tracks per artist:");
    for artist in &ctx.artists {
        println!("  {artist}");
    }

    if let (Some(processed), Some(curated)) = (&ctx.processed, &ctx.curated) {
        println!(
            "Processed: {} rows in {} albums",
            processed.metric, processed.albums
        );
        println!(
            "Curated: {} tracks in {} albums",
            curated.metric, curated.albums
        );
    }
    println!(
        "Stages: {}",
        ctx.completed
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    );
}
