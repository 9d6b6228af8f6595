//! Single object store and fetch.

use std::path::Path;

use tracing::info;

use crate::download::download_object;
use crate::error::{StoreError, SyncError, TransferError};
use crate::store::ObjectStore;
use crate::types::StorageLocation;

/// Uploads `data` to `location`, refusing to replace an existing object.
///
/// Artifact keys are write-once: a second store to the same key fails with
/// [`SyncError::AlreadyExists`] whether or not the content matches.
pub async fn store_object(
    store: &dyn ObjectStore,
    location: &StorageLocation,
    data: Vec<u8>,
) -> Result<(), SyncError> {
    let size = data.len();
    match store
        .put_object(location.bucket(), location.key(), data, true)
        .await
    {
        Ok(()) => {
            info!("Stored {} bytes at {}", size, location);
            Ok(())
        }
        Err(StoreError::AlreadyExists(_)) => Err(SyncError::AlreadyExists {
            location: location.clone(),
        }),
        Err(e) => Err(SyncError::Store(e)),
    }
}

/// Downloads `location` to `local_path`, creating parent directories and
/// overwriting any existing file.
///
/// # Returns
///
/// The number of bytes written.
pub async fn fetch_object(
    store: &dyn ObjectStore,
    location: &StorageLocation,
    local_path: &Path,
) -> Result<u64, SyncError> {
    if let Some(parent) = local_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let written = download_object(store, location.bucket(), location.key(), local_path)
        .await
        .map_err(|source: TransferError| SyncError::Transfer {
            location: location.clone(),
            source,
        })?;

    info!(
        "Fetched {} ({} bytes) to {}",
        location,
        written,
        local_path.display()
    );
    Ok(written)
}
