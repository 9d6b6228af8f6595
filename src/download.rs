//! Single object download to a local file.

use std::path::Path;

use futures_util::StreamExt;
use md5::{Digest, Md5};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, warn};

use crate::error::TransferError;
use crate::store::ObjectStore;

/// Streams one object into `local_path`, replacing any existing file.
///
/// The parent directory must already exist. The byte count is checked against
/// the announced length and the content against the store's MD5 when either
/// is available. On any failure after the file was opened, the partial file is
/// removed so a failed transfer never leaves truncated content behind.
///
/// # Arguments
///
/// * `store` - Backend to read from
/// * `bucket` - Bucket name
/// * `key` - Object key
/// * `local_path` - Destination file
///
/// # Returns
///
/// The number of bytes written.
pub async fn download_object(
    store: &dyn ObjectStore,
    bucket: &str,
    key: &str,
    local_path: &Path,
) -> Result<u64, TransferError> {
    let body = store.get_object(bucket, key).await?;
    let file = tokio::fs::File::create(local_path).await?;

    let result = write_body(body, file).await;
    if result.is_err() {
        if let Err(e) = tokio::fs::remove_file(local_path).await {
            warn!(path = %local_path.display(), "Failed to remove partial file: {}", e);
        }
    }
    result
}

async fn write_body(
    body: crate::store::ObjectBody,
    file: tokio::fs::File,
) -> Result<u64, TransferError> {
    let mut writer = BufWriter::new(file);
    let mut stream = body.stream;
    let mut hasher = body.md5.as_ref().map(|_| Md5::new());
    let mut written = 0u64;

    while let Some(piece) = stream.next().await {
        let chunk = piece?;
        if let Some(h) = hasher.as_mut() {
            h.update(&chunk);
        }
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;

    if let Some(expected) = body.content_length {
        if written != expected {
            return Err(TransferError::SizeMismatch {
                expected,
                actual: written,
            });
        }
    }

    if let (Some(expected), Some(hasher)) = (body.md5, hasher) {
        let actual = format!("{:x}", hasher.finalize());
        if !actual.eq_ignore_ascii_case(&expected) {
            return Err(TransferError::ChecksumMismatch { expected, actual });
        }
        debug!("MD5 verified ({})", actual);
    }

    Ok(written)
}
