//! Data structures shared by the sync pipeline.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{FailedTransfer, TransferError};

/// A remote object as reported by a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectDescriptor {
    /// Full object key, unique within the bucket.
    pub key: String,
    /// Object size in bytes.
    pub size: u64,
}

impl ObjectDescriptor {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }
}

/// One planned download: which object goes to which local file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferPair {
    pub remote_key: String,
    pub local_path: PathBuf,
}

/// Result of attempting one [`TransferPair`]. `Ok` carries the bytes written.
#[derive(Debug)]
pub struct TransferOutcome {
    pub pair: TransferPair,
    pub result: Result<u64, TransferError>,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcomes of a whole plan, in plan order.
#[derive(Debug, Default)]
pub struct TransferReport {
    outcomes: Vec<TransferOutcome>,
}

impl TransferReport {
    pub(crate) fn new(outcomes: Vec<TransferOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn outcomes(&self) -> &[TransferOutcome] {
        &self.outcomes
    }

    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    /// Total bytes written by successful transfers.
    pub fn bytes_transferred(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }

    /// Consumes the report, keeping only the failed pairs (plan order).
    pub fn into_failures(self) -> Vec<FailedTransfer> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome.result {
                Ok(_) => None,
                Err(cause) => Some(FailedTransfer {
                    remote_key: outcome.pair.remote_key,
                    local_path: outcome.pair.local_path,
                    cause,
                }),
            })
            .collect()
    }
}

/// Identifies a single remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct StorageLocation {
    bucket: String,
    key: String,
}

impl StorageLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.key)
    }
}
