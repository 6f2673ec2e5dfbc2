use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ferje_core::anonymizer::anonymize_mmsi;
use ferje_core::bucket::{BucketStore, FsBucketStore};
use ferje_core::config::ImporterConfig;
use ferje_core::importer::{ImportOutcome, Importer};
use ferje_core::publisher::JsonLinesPublisher;
use ferje_core::SignalCleaner;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Ferry AIS position cleaning and import", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean a local position file against a local vessel file
    Clean(CleanArgs),
    /// Process one uploaded position file and publish the result
    Import(ImportArgs),
    /// Print the pseudonymous ferry id for an MMSI
    Hash(HashArgs),
}

#[derive(Args, Debug)]
struct CleanArgs {
    /// Position table (`<date>.csv`)
    #[arg(long)]
    positions: PathBuf,
    /// Vessel metadata table (`<date>_shipdata.csv`)
    #[arg(long)]
    vessels: PathBuf,
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Write signals here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct ImportArgs {
    /// Directory standing in for the upload bucket
    #[arg(long)]
    root: Option<PathBuf>,
    /// Object key of the uploaded position file
    #[arg(long)]
    key: String,
    /// Bucket name recorded in the completion notice
    #[arg(long, default_value = "local")]
    bucket: String,
    /// JSON-lines file completion notices are appended to
    #[arg(long, default_value = "notices.jsonl")]
    queue: PathBuf,
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Read from this S3 bucket instead of a local directory
    #[cfg(feature = "s3")]
    #[arg(long, conflicts_with = "root")]
    s3_bucket: Option<String>,
}

#[derive(Args, Debug)]
struct HashArgs {
    mmsi: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Clean(args) => handle_clean(args),
        Command::Import(args) => handle_import(args).await,
        Command::Hash(args) => {
            println!("{}", anonymize_mmsi(&args.mmsi));
            Ok(())
        }
    }
}

fn handle_clean(args: CleanArgs) -> Result<()> {
    let config = ImporterConfig::resolve(args.config.as_deref())?;
    let cleaner = SignalCleaner::new(config.cleaner_config()?);

    let positions = fs::read_to_string(&args.positions)
        .with_context(|| format!("failed to read {}", args.positions.display()))?;
    let vessels = fs::read_to_string(&args.vessels)
        .with_context(|| format!("failed to read {}", args.vessels.display()))?;

    let result = cleaner
        .clean(&positions, &vessels)
        .with_context(|| format!("failed to clean {}", args.positions.display()))?;

    for row in &result.skipped {
        warn!(
            line_number = row.line_number,
            reason = row.reason.as_str(),
            mmsi = row.mmsi.as_deref(),
            "skipped position row"
        );
    }
    info!(
        signals = result.signals.len(),
        skipped = result.skipped.len(),
        excluded = result.excluded,
        "clean finished"
    );

    let json = serde_json::to_string_pretty(&result.signals)?;
    match args.output {
        Some(path) => fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

async fn handle_import(args: ImportArgs) -> Result<()> {
    let config = ImporterConfig::resolve(args.config.as_deref())?;
    let cleaner = SignalCleaner::new(config.cleaner_config()?);

    let (store, bucket) = open_store(&args).await?;
    let publisher = Arc::new(JsonLinesPublisher::new(&args.queue));
    let importer = Importer::new(store, publisher, cleaner, config.naming.clone());

    let outcome = importer
        .handle_upload(&bucket, &args.key)
        .await
        .with_context(|| format!("failed to import {}", args.key))?;

    match outcome {
        ImportOutcome::Ignored { key } => info!(key, "upload ignored"),
        ImportOutcome::Reclaimed { key, metadata_key } => {
            info!(key, metadata_key, "removed leftover metadata file")
        }
        ImportOutcome::Processed(summary) => info!(
            key = summary.key,
            source_hash = summary.source_hash,
            signals = summary.signals,
            skipped = summary.skipped,
            excluded = summary.excluded,
            queue = %args.queue.display(),
            "import finished"
        ),
    }
    Ok(())
}

async fn open_store(args: &ImportArgs) -> Result<(Arc<dyn BucketStore>, String)> {
    #[cfg(feature = "s3")]
    if let Some(name) = &args.s3_bucket {
        let config = ferje_core::bucket::S3Config::from_env(name.clone());
        let store = ferje_core::bucket::S3BucketStore::new(config).await?;
        return Ok((Arc::new(store), name.clone()));
    }

    let root = args
        .root
        .as_ref()
        .context("--root is required without an S3 bucket")?;
    let store = FsBucketStore::new(root)?;
    Ok((Arc::new(store), args.bucket.clone()))
}
