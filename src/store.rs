//! Remote object store boundary.
//!
//! The sync engine only needs three capabilities from a backend: paginated
//! recursive listing, streamed reads, and writes with an optional create-only
//! precondition. Any object store exposing those can sit behind [`ObjectStore`].

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::error::StoreError;
use crate::types::ObjectDescriptor;

/// One page of a listing call.
#[derive(Debug, Default)]
pub struct ObjectPage {
    pub objects: Vec<ObjectDescriptor>,
    /// Token for the next page, `None` on the last page.
    pub next_page_token: Option<String>,
}

/// Streamed content of a remote object.
pub struct ObjectBody {
    pub stream: BoxStream<'static, Result<Bytes, StoreError>>,
    /// Announced length, when the backend knows it.
    pub content_length: Option<u64>,
    /// Hex MD5 of the full content, when the backend publishes one.
    pub md5: Option<String>,
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody")
            .field("content_length", &self.content_length)
            .field("md5", &self.md5)
            .finish_non_exhaustive()
    }
}

/// Low-level object store operations, implemented by each backend.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List objects whose key starts with `prefix`, without a delimiter.
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ObjectPage, StoreError>;

    /// Open an object for reading.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError>;

    /// Upload `data` under `key`.
    ///
    /// With `create_only`, fails with [`StoreError::AlreadyExists`] instead of
    /// replacing an existing object.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        create_only: bool,
    ) -> Result<(), StoreError>;
}
