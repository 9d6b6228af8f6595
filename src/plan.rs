//! Transfer plan construction.

use std::path::Path;

use tracing::debug;

use crate::error::SyncError;
use crate::mapping::map_remote_key;
use crate::types::{ObjectDescriptor, TransferPair};

/// Builds the ordered list of downloads for a directory sync.
///
/// Zero-byte objects are dropped: buckets emulate folders with empty
/// placeholder objects, and materializing them would create empty files where
/// directories belong. Every other descriptor is mapped with
/// [`map_remote_key`], keeping the input order.
///
/// # Returns
///
/// The plan, or the first [`SyncError::InvalidKey`] encountered.
pub fn build_plan(
    descriptors: &[ObjectDescriptor],
    prefix: &str,
    local_root: &Path,
) -> Result<Vec<TransferPair>, SyncError> {
    let mut plan = Vec::with_capacity(descriptors.len());

    for descriptor in descriptors {
        if descriptor.size == 0 {
            debug!(key = %descriptor.key, "Skipping zero-byte placeholder");
            continue;
        }

        plan.push(TransferPair {
            remote_key: descriptor.key.clone(),
            local_path: map_remote_key(&descriptor.key, prefix, local_root)?,
        });
    }

    Ok(plan)
}
