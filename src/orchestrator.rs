//! Directory sync orchestration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::config::DEFAULT_MAX_WORKERS;
use crate::error::{DirectorySyncError, SyncError};
use crate::lister::{directory_prefix, list_objects};
use crate::parallel::download_plan;
use crate::plan::build_plan;
use crate::store::ObjectStore;
use crate::types::TransferPair;

/// Knobs for a single directory sync.
#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
    /// Maximum number of concurrent downloads.
    pub max_workers: usize,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            show_progress: false,
        }
    }
}

/// Lists `remote_prefix` and builds the transfer plan without downloading.
pub async fn plan_directory(
    store: &dyn ObjectStore,
    bucket: &str,
    remote_prefix: &str,
    local_root: &Path,
) -> Result<Vec<TransferPair>, SyncError> {
    let listing_prefix = directory_prefix(remote_prefix);
    let descriptors = list_objects(store, bucket, &listing_prefix).await?;
    let plan = build_plan(&descriptors, &listing_prefix, local_root)?;

    info!(
        "Planned {} of {} listed objects under gs://{}/{}",
        plan.len(),
        descriptors.len(),
        bucket,
        listing_prefix
    );
    Ok(plan)
}

/// Downloads every object under `remote_prefix` into `local_root`.
///
/// This is the main entry point for directory sync. It performs the following steps:
///
/// 1. Creates `local_root` if needed (never deletes it)
/// 2. Lists all objects below the prefix, recursively
/// 3. Builds the plan, dropping zero-byte folder markers
/// 4. Downloads the plan with a bounded worker pool
/// 5. Fails if any single object failed, naming all of them
///
/// # Arguments
///
/// * `store` - Backend to read from
/// * `bucket` - Bucket name
/// * `remote_prefix` - "Directory" to sync, with or without a trailing `/`
/// * `local_root` - Local directory that mirrors the prefix
/// * `options` - Worker-pool size and progress display
///
/// # Returns
///
/// `local_root` when every object transferred, otherwise
/// [`SyncError::DirectorySync`] itemizing each failed pair.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use std::sync::Arc;
/// use artifact_sync::{sync_directory, MemoryStore, SyncOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(MemoryStore::new());
/// sync_directory(store, "bkt", "runs/42/ckpt", Path::new("./out"), SyncOptions::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn sync_directory(
    store: Arc<dyn ObjectStore>,
    bucket: &str,
    remote_prefix: &str,
    local_root: &Path,
    options: SyncOptions,
) -> Result<PathBuf, SyncError> {
    tokio::fs::create_dir_all(local_root).await?;

    let plan = plan_directory(store.as_ref(), bucket, remote_prefix, local_root).await?;

    let pb = if options.show_progress {
        let progress_bar = indicatif::ProgressBar::new(plan.len() as u64);
        progress_bar.set_style(
            indicatif::ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg} | {elapsed_precise} elapsed, ETA {eta_precise}")
                .map_err(|e| SyncError::Config(format!("progress template: {}", e)))?
                .progress_chars("█▓▒░ "),
        );
        progress_bar.set_message(format!("📦 Downloading {} objects", plan.len()));
        progress_bar
    } else {
        indicatif::ProgressBar::hidden()
    };

    let report = download_plan(Arc::clone(&store), bucket, &plan, options.max_workers, &pb).await;
    debug_assert_eq!(report.len(), plan.len());

    let attempted = report.len();
    let bytes = report.bytes_transferred();
    let failures = report.into_failures();

    if !failures.is_empty() {
        pb.finish_with_message("❌ Sync failed!");
        for failure in &failures {
            error!(
                "Failed to download '{}' to '{}': {}",
                failure.remote_key,
                failure.local_path.display(),
                failure.cause
            );
        }
        return Err(DirectorySyncError {
            prefix: remote_prefix.to_string(),
            attempted,
            failures,
        }
        .into());
    }

    pb.finish_with_message("✅ Sync complete");
    info!(
        "Synced {} objects ({} bytes) from gs://{}/{} to {}",
        attempted,
        bytes,
        bucket,
        remote_prefix,
        local_root.display()
    );
    Ok(local_root.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[tokio::test]
    async fn test_plan_directory_uses_directory_form() {
        let memory = MemoryStore::new();
        memory.insert("bkt", "runs/42/ckpt/a.bin", vec![0u8; 10]).await;
        memory.insert("bkt", "runs/42/ckpt2/z.bin", vec![0u8; 10]).await;

        let plan = plan_directory(&memory, "bkt", "runs/42/ckpt", Path::new("out"))
            .await
            .unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].local_path, PathBuf::from("out/a.bin"));
    }

    #[tokio::test]
    async fn test_empty_listing_sync_succeeds_and_creates_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("new/root");
        let memory = MemoryStore::new();
        memory.insert("bkt", "elsewhere/x", "1").await;

        let synced = sync_directory(
            Arc::new(memory),
            "bkt",
            "runs/1/empty",
            &root,
            SyncOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(synced, root);
        assert!(root.is_dir());
        assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    }
}
