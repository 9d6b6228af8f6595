//! Error types for artifact sync operations.

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::StorageLocation;

/// Errors returned by an [`ObjectStore`](crate::store::ObjectStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The bucket or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A create-only write hit an existing object.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// Credentials were missing, expired or lacked permission.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// The configured endpoint cannot be used to build request URLs.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Transport-level failure (connect, TLS, body stream).
    #[error(transparent)]
    Request(#[from] reqwest::Error),

    /// I/O error inside the backend.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Response body could not be decoded.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the failure is likely to go away on its own.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Http { status, .. } => *status == 429 || *status >= 500,
            StoreError::Request(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            StoreError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }
}

/// Cause of a single failed object transfer.
#[derive(Error, Debug)]
pub enum TransferError {
    /// The remote store rejected or failed the read.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Writing the local file failed.
    #[error("local write failed: {0}")]
    Io(#[from] io::Error),

    /// Fewer or more bytes arrived than the store announced.
    #[error("size mismatch: expected {expected} bytes, got {actual} bytes")]
    SizeMismatch { expected: u64, actual: u64 },

    /// Downloaded content does not hash to the store's MD5.
    #[error("MD5 mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The worker task died before producing a result.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl TransferError {
    pub fn is_transient(&self) -> bool {
        match self {
            TransferError::Store(e) => e.is_transient(),
            TransferError::SizeMismatch { .. } | TransferError::ChecksumMismatch { .. } => true,
            TransferError::Io(_) | TransferError::Worker(_) => false,
        }
    }
}

/// One failed pair of a directory sync.
#[derive(Debug)]
pub struct FailedTransfer {
    pub remote_key: String,
    pub local_path: PathBuf,
    pub cause: TransferError,
}

/// Aggregate failure of a directory sync: every pair that did not transfer.
#[derive(Debug)]
pub struct DirectorySyncError {
    /// Remote prefix that was being synced.
    pub prefix: String,
    /// Number of pairs in the plan.
    pub attempted: usize,
    /// Failed pairs, in plan order.
    pub failures: Vec<FailedTransfer>,
}

impl fmt::Display for DirectorySyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} transfers failed for prefix '{}'",
            self.failures.len(),
            self.attempted,
            self.prefix
        )?;
        for failure in &self.failures {
            write!(
                f,
                "\n  - '{}' -> '{}': {}",
                failure.remote_key,
                failure.local_path.display(),
                failure.cause
            )?;
        }
        Ok(())
    }
}

impl std::error::Error for DirectorySyncError {}

/// Errors that can occur during artifact sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Enumerating the remote prefix failed.
    #[error("failed to list objects under '{prefix}': {source}")]
    Listing {
        prefix: String,
        #[source]
        source: StoreError,
    },

    /// A listed key does not live under the requested prefix.
    #[error("object key '{key}' cannot be mapped under prefix '{prefix}'")]
    InvalidKey { key: String, prefix: String },

    /// One or more objects of a directory sync failed.
    #[error(transparent)]
    DirectorySync(#[from] DirectorySyncError),

    /// A create-only store hit an existing object.
    #[error("object already exists at {location}")]
    AlreadyExists { location: StorageLocation },

    /// A single-object fetch failed.
    #[error("failed to fetch {location}: {source}")]
    Transfer {
        location: StorageLocation,
        #[source]
        source: TransferError,
    },

    /// Backend error outside listing and transfers.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Local I/O error.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether re-running the whole operation may succeed.
    ///
    /// A directory sync counts as retryable when at least one of its failures
    /// is transient.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Listing { source, .. } => source.is_transient(),
            SyncError::DirectorySync(e) => e.failures.iter().any(|f| f.cause.is_transient()),
            SyncError::Transfer { source, .. } => source.is_transient(),
            SyncError::Store(e) => e.is_transient(),
            SyncError::InvalidKey { .. }
            | SyncError::AlreadyExists { .. }
            | SyncError::Io(_)
            | SyncError::Config(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(key: &str, path: &str, cause: TransferError) -> FailedTransfer {
        FailedTransfer {
            remote_key: key.to_string(),
            local_path: PathBuf::from(path),
            cause,
        }
    }

    #[test]
    fn test_directory_sync_error_lists_every_failure() {
        let err = DirectorySyncError {
            prefix: "runs/42/ckpt".to_string(),
            attempted: 5,
            failures: vec![
                failure(
                    "runs/42/ckpt/a.bin",
                    "out/a.bin",
                    TransferError::Store(StoreError::NotFound("runs/42/ckpt/a.bin".into())),
                ),
                failure(
                    "runs/42/ckpt/c.bin",
                    "out/c.bin",
                    TransferError::SizeMismatch {
                        expected: 10,
                        actual: 4,
                    },
                ),
            ],
        };

        let msg = err.to_string();
        assert!(msg.starts_with("2 of 5 transfers failed for prefix 'runs/42/ckpt'"));
        assert!(msg.contains("'runs/42/ckpt/a.bin' -> 'out/a.bin': not found"));
        assert!(msg.contains("'runs/42/ckpt/c.bin' -> 'out/c.bin': size mismatch"));
    }

    #[test]
    fn test_retry_classification() {
        let transient = SyncError::Listing {
            prefix: "p".into(),
            source: StoreError::Http {
                status: 503,
                message: "backend unavailable".into(),
            },
        };
        assert!(transient.is_retryable());

        let denied = SyncError::Listing {
            prefix: "p".into(),
            source: StoreError::PermissionDenied("bucket".into()),
        };
        assert!(!denied.is_retryable());

        let invalid = SyncError::InvalidKey {
            key: "other/a".into(),
            prefix: "p".into(),
        };
        assert!(!invalid.is_retryable());

        let partial = SyncError::DirectorySync(DirectorySyncError {
            prefix: "p".into(),
            attempted: 2,
            failures: vec![failure(
                "p/a",
                "a",
                TransferError::Store(StoreError::Http {
                    status: 500,
                    message: String::new(),
                }),
            )],
        });
        assert!(partial.is_retryable());
    }
}
