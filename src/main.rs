use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use artifact_sync::{ArtifactStore, ConfigFile, RunPath, SyncConfig, SyncError};
use clap::{Parser, Subcommand};
use tokio_retry2::strategy::FixedInterval;
use tokio_retry2::{Retry, RetryError};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "artifact-sync")]
#[command(about = "Sync trained-model artifacts between a GCS bucket and local disk", long_about = None)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON config file (flags and environment override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Bucket holding the artifacts
    #[arg(long, env = "ARTIFACT_SYNC_BUCKET", global = true)]
    bucket: Option<String>,

    /// Project billed for storage requests
    #[arg(long, env = "ARTIFACT_SYNC_PROJECT", global = true)]
    project: Option<String>,

    /// Number of parallel downloads (default: 16)
    #[arg(short = 'w', long, global = true)]
    workers: Option<usize>,

    /// Storage API endpoint (e.g. an emulator)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// OAuth2 access token
    #[arg(long, env = "ARTIFACT_SYNC_ACCESS_TOKEN", hide_env_values = true, global = true)]
    access_token: Option<String>,

    /// Connection timeout (e.g. "10s")
    #[arg(long, value_parser = humantime::parse_duration, global = true)]
    connect_timeout: Option<Duration>,

    /// Re-run a failed operation up to N times when the failure looks transient
    #[arg(long, default_value_t = 0, global = true)]
    retries: usize,

    /// Delay between retries
    #[arg(long, default_value = "5s", value_parser = humantime::parse_duration, global = true)]
    retry_delay: Duration,

    /// Disable progress bar
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Pipeline flow name
    #[arg(long)]
    flow: String,

    /// Pipeline run id
    #[arg(long)]
    run_id: String,
}

impl RunArgs {
    fn run_path(&self) -> RunPath {
        RunPath::new(&self.flow, &self.run_id)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download every object under a remote prefix
    FetchDir {
        remote_prefix: String,
        local_dir: PathBuf,

        /// Print the transfer plan as JSON instead of downloading
        #[arg(long)]
        dry_run: bool,
    },
    /// Download a single object
    Fetch { key: String, local_path: PathBuf },
    /// Upload a local file; fails if the key already exists
    Store { local_file: PathBuf, key: String },
    /// Download a subdirectory of a pipeline run
    FetchRunDir {
        #[command(flatten)]
        run: RunArgs,

        /// Subdirectory below the run (e.g. "trained/checkpoint-2")
        #[arg(long)]
        subdir: String,

        local_dir: PathBuf,
    },
    /// Download one file of a pipeline run to <local-root>/<flow>/<run>/<file>
    FetchRunFile {
        #[command(flatten)]
        run: RunArgs,

        #[arg(long)]
        file: String,

        #[arg(long, default_value = ".")]
        local_root: PathBuf,
    },
    /// Upload a local file as one file of a pipeline run
    StoreRunFile {
        #[command(flatten)]
        run: RunArgs,

        #[arg(long)]
        file: String,

        local_file: PathBuf,
    },
}

fn build_config(args: &Args) -> Result<SyncConfig> {
    let file = match &args.config {
        Some(path) => ConfigFile::from_path(path)?,
        None => ConfigFile::default(),
    };

    let bucket = args
        .bucket
        .clone()
        .or(file.bucket.clone())
        .context("bucket is required (--bucket, ARTIFACT_SYNC_BUCKET or config file)")?;
    let project = args
        .project
        .clone()
        .or(file.project.clone())
        .context("project is required (--project, ARTIFACT_SYNC_PROJECT or config file)")?;

    let connect_timeout = match args.connect_timeout {
        Some(timeout) => Some(timeout),
        None => file.connect_timeout()?,
    };

    let mut builder = SyncConfig::builder(bucket, project)
        .access_token(args.access_token.clone().or(file.access_token.clone()))
        .connect_timeout(connect_timeout)
        .show_progress(!args.quiet && atty::is(atty::Stream::Stderr));
    if let Some(workers) = args.workers.or(file.max_workers) {
        builder = builder.max_workers(workers);
    }
    if let Some(endpoint) = args.endpoint.clone().or(file.endpoint.clone()) {
        builder = builder.endpoint(endpoint);
    }

    Ok(builder.build()?)
}

/// Runs `operation` once, then again up to `retries` times while it fails
/// with a retryable error.
async fn with_retries<T, F, Fut>(
    retries: usize,
    delay: Duration,
    mut operation: F,
) -> Result<T, SyncError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SyncError>>,
{
    let strategy = FixedInterval::from_millis(delay.as_millis() as u64).take(retries);

    Retry::spawn(strategy, || {
        let attempt = operation();
        async move {
            match attempt.await {
                Ok(value) => Ok(value),
                Err(e) if e.is_retryable() => {
                    warn!("Operation failed, will retry: {}", e);
                    RetryError::to_transient(e)
                }
                Err(e) => Err(RetryError::Permanent(e)),
            }
        }
    })
    .await
}

async fn run(args: &Args, store: &ArtifactStore) -> Result<()> {
    let (retries, delay) = (args.retries, args.retry_delay);

    match &args.command {
        Command::FetchDir {
            remote_prefix,
            local_dir,
            dry_run: true,
        } => {
            let plan = store.plan_directory(remote_prefix, local_dir).await?;
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::FetchDir {
            remote_prefix,
            local_dir,
            dry_run: false,
        } => {
            let root = with_retries(retries, delay, || {
                store.fetch_directory(remote_prefix, local_dir)
            })
            .await?;
            info!("✅ Synced gs://{}/{} to {}", store.config().bucket(), remote_prefix, root.display());
        }
        Command::Fetch { key, local_path } => {
            let bytes =
                with_retries(retries, delay, || store.fetch_object(key, local_path)).await?;
            info!("✅ Fetched {} ({} bytes) to {}", key, bytes, local_path.display());
        }
        Command::Store { local_file, key } => {
            let data = tokio::fs::read(local_file)
                .await
                .with_context(|| format!("cannot read {}", local_file.display()))?;
            let location =
                with_retries(retries, delay, || store.store_object(data.clone(), key)).await?;
            info!("✅ Stored {} at {}", local_file.display(), location);
        }
        Command::FetchRunDir {
            run,
            subdir,
            local_dir,
        } => {
            let run = run.run_path();
            let root = with_retries(retries, delay, || {
                store.fetch_run_directory(&run, subdir, local_dir)
            })
            .await?;
            info!("✅ Synced {} of {}/{} to {}", subdir, run.flow_name, run.run_id, root.display());
        }
        Command::FetchRunFile {
            run,
            file,
            local_root,
        } => {
            let run = run.run_path();
            let path = with_retries(retries, delay, || {
                store.fetch_run_file(&run, file, local_root)
            })
            .await?;
            info!("✅ Fetched {} to {}", file, path.display());
        }
        Command::StoreRunFile {
            run,
            file,
            local_file,
        } => {
            let run = run.run_path();
            let data = tokio::fs::read(local_file)
                .await
                .with_context(|| format!("cannot read {}", local_file.display()))?;
            let key = with_retries(retries, delay, || {
                store.store_run_file(&run, file, data.clone())
            })
            .await?;
            info!("✅ Stored {} as {}", local_file.display(), key);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("artifact_sync={}", log_level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = build_config(&args)?;
    info!("Bucket: {}", config.bucket());
    info!("Project: {}", config.project());
    info!("Workers: {}", config.max_workers());

    let store = ArtifactStore::new(config)?;

    if let Err(e) = run(&args, &store).await {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
