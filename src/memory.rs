//! In-process object store.
//!
//! Keeps objects in a sorted map per bucket, which gives the same stable,
//! lexicographic listing order as a real bucket. Useful for embedding the sync
//! engine in local pipelines and for tests.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use md5::{Digest, Md5};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{ObjectBody, ObjectPage, ObjectStore};
use crate::types::ObjectDescriptor;

/// Default number of objects returned per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug)]
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, BTreeMap<String, Bytes>>>,
    page_size: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Creates a store that paginates listings every `page_size` objects.
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            page_size: page_size.max(1),
        }
    }

    /// Inserts or replaces an object without any precondition.
    pub async fn insert(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.buckets
            .write()
            .await
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    /// Returns a copy of an object's content, if present.
    pub async fn contents(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.buckets
            .read()
            .await
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        page_token: Option<&str>,
    ) -> Result<ObjectPage, StoreError> {
        let buckets = self.buckets.read().await;
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::NotFound(format!("bucket {}", bucket)))?;

        // The page token is the last key of the previous page.
        let lower = match page_token {
            Some(token) => Bound::Excluded(token.to_string()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut page: Vec<ObjectDescriptor> = objects
            .range((lower, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .take(self.page_size + 1)
            .map(|(key, data)| ObjectDescriptor::new(key.clone(), data.len() as u64))
            .collect();

        let next_page_token = if page.len() > self.page_size {
            page.truncate(self.page_size);
            page.last().map(|d| d.key.clone())
        } else {
            None
        };

        Ok(ObjectPage {
            objects: page,
            next_page_token,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError> {
        let data = self
            .contents(bucket, key)
            .await
            .ok_or_else(|| StoreError::NotFound(format!("gs://{}/{}", bucket, key)))?;

        let md5 = format!("{:x}", Md5::digest(&data));
        let content_length = Some(data.len() as u64);

        Ok(ObjectBody {
            stream: stream::once(async move { Ok(data) }).boxed(),
            content_length,
            md5: Some(md5),
        })
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        create_only: bool,
    ) -> Result<(), StoreError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets.entry(bucket.to_string()).or_default();

        if create_only && objects.contains_key(key) {
            return Err(StoreError::AlreadyExists(format!("gs://{}/{}", bucket, key)));
        }

        objects.insert(key.to_string(), Bytes::from(data));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_all(body: ObjectBody) -> Vec<u8> {
        let chunks: Vec<Result<Bytes, StoreError>> = body.stream.collect().await;
        chunks
            .into_iter()
            .flat_map(|c| c.unwrap().to_vec())
            .collect()
    }

    #[tokio::test]
    async fn test_list_pages_are_sorted_and_prefix_bounded() {
        let store = MemoryStore::with_page_size(2);
        for key in ["p/c", "p/a", "p/b", "q/z", "o/x"] {
            store.insert("bkt", key, key.as_bytes().to_vec()).await;
        }

        let first = store.list_page("bkt", "p/", None).await.unwrap();
        let keys: Vec<&str> = first.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["p/a", "p/b"]);
        assert_eq!(first.next_page_token.as_deref(), Some("p/b"));

        let second = store
            .list_page("bkt", "p/", first.next_page_token.as_deref())
            .await
            .unwrap();
        let keys: Vec<&str> = second.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["p/c"]);
        assert!(second.next_page_token.is_none());
    }

    #[tokio::test]
    async fn test_list_missing_bucket_is_not_found() {
        let store = MemoryStore::new();
        let err = store.list_page("nope", "", None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_only_put_rejects_existing_key() {
        let store = MemoryStore::new();
        store
            .put_object("bkt", "k", b"one".to_vec(), true)
            .await
            .unwrap();

        let err = store
            .put_object("bkt", "k", b"one".to_vec(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));

        // Unconditional writes still replace.
        store
            .put_object("bkt", "k", b"two".to_vec(), false)
            .await
            .unwrap();
        assert_eq!(store.contents("bkt", "k").await.unwrap(), Bytes::from("two"));
    }

    #[tokio::test]
    async fn test_get_object_reports_length_and_md5() {
        let store = MemoryStore::new();
        store.insert("bkt", "hello.txt", "hello").await;

        let body = store.get_object("bkt", "hello.txt").await.unwrap();
        assert_eq!(body.content_length, Some(5));
        assert_eq!(body.md5.as_deref(), Some("5d41402abc4b2a76b9719d911017c592"));
        assert_eq!(read_all(body).await, b"hello");

        let err = store.get_object("bkt", "missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }
}
