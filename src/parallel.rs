//! Bounded-concurrency execution of a transfer plan.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::download::download_object;
use crate::error::TransferError;
use crate::store::ObjectStore;
use crate::types::{TransferOutcome, TransferPair, TransferReport};

/// Downloads every pair of `plan` with at most `max_workers` transfers in flight.
///
/// All parent directories are created in one sequential pass before any
/// worker starts. Each pair is then attempted exactly once by its own task,
/// gated by a semaphore; existing files are always overwritten. Errors are
/// captured per pair and never stop sibling transfers.
///
/// # Arguments
///
/// * `store` - Backend shared by all workers
/// * `bucket` - Bucket name
/// * `plan` - Pairs to transfer
/// * `max_workers` - Concurrency bound; values below 1 are treated as 1
/// * `pb` - Progress bar advanced once per finished pair
///
/// # Returns
///
/// A report with exactly one outcome per pair, in plan order.
pub async fn download_plan(
    store: Arc<dyn ObjectStore>,
    bucket: &str,
    plan: &[TransferPair],
    max_workers: usize,
    pb: &indicatif::ProgressBar,
) -> TransferReport {
    let failed_dirs = create_parent_dirs(plan).await;

    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let bucket: Arc<str> = Arc::from(bucket);
    let mut tasks = Vec::with_capacity(plan.len());

    for pair in plan {
        let parent_error = pair
            .local_path
            .parent()
            .and_then(|parent| failed_dirs.get(parent));
        if let Some(e) = parent_error {
            pb.inc(1);
            tasks.push(Pending::Failed(io::Error::new(e.kind(), e.to_string())));
            continue;
        }

        let semaphore = Arc::clone(&semaphore);
        let store = Arc::clone(&store);
        let bucket = Arc::clone(&bucket);
        let pb_clone = pb.clone();
        let key = pair.remote_key.clone();
        let path = pair.local_path.clone();

        let task = tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| TransferError::Worker(e.to_string()))?;

            pb_clone.set_message(format!("| ⬇️  {}", key));
            let result = download_object(store.as_ref(), &bucket, &key, &path).await;
            pb_clone.inc(1);
            result
        });
        tasks.push(Pending::Running(task));
    }

    // Await in plan order so the report lines up with the plan.
    let mut outcomes = Vec::with_capacity(plan.len());
    for (pair, pending) in plan.iter().zip(tasks) {
        let result = match pending {
            Pending::Failed(e) => Err(TransferError::Io(e)),
            Pending::Running(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(TransferError::Worker(e.to_string())),
            },
        };

        match &result {
            Ok(bytes) => debug!(key = %pair.remote_key, bytes, "Downloaded object"),
            Err(e) => warn!(
                key = %pair.remote_key,
                path = %pair.local_path.display(),
                "Failed to download object: {}",
                e
            ),
        }

        outcomes.push(TransferOutcome {
            pair: pair.clone(),
            result,
        });
    }

    TransferReport::new(outcomes)
}

enum Pending {
    Running(tokio::task::JoinHandle<Result<u64, TransferError>>),
    Failed(io::Error),
}

/// Creates every distinct parent directory of the plan, shallowest first.
///
/// Returns the directories that could not be created.
async fn create_parent_dirs(plan: &[TransferPair]) -> HashMap<PathBuf, io::Error> {
    let parents: BTreeSet<&Path> = plan
        .iter()
        .filter_map(|pair| pair.local_path.parent())
        .filter(|parent| !parent.as_os_str().is_empty())
        .collect();

    let mut failed = HashMap::new();
    for parent in parents {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(dir = %parent.display(), "Failed to create directory: {}", e);
            failed.insert(parent.to_path_buf(), e);
        }
    }
    failed
}
