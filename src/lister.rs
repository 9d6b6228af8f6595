//! Recursive listing of a remote prefix.

use tracing::debug;

use crate::error::SyncError;
use crate::store::ObjectStore;
use crate::types::ObjectDescriptor;

/// Normalizes a prefix to directory form: `runs/42/ckpt` becomes `runs/42/ckpt/`.
///
/// Listing with the directory form keeps sibling prefixes such as
/// `runs/42/ckpt2/` out of the result. The empty prefix stays empty.
pub fn directory_prefix(prefix: &str) -> String {
    let base = prefix.trim_end_matches('/');
    if base.is_empty() {
        String::new()
    } else {
        format!("{}/", base)
    }
}

/// Lists every object under `prefix`, following page tokens to the end.
///
/// # Arguments
///
/// * `store` - Backend to list from
/// * `bucket` - Bucket name
/// * `prefix` - Raw key prefix, used as given
///
/// # Returns
///
/// All descriptors in the order the store returned them, or
/// [`SyncError::Listing`] wrapping the store's error unchanged.
pub async fn list_objects(
    store: &dyn ObjectStore,
    bucket: &str,
    prefix: &str,
) -> Result<Vec<ObjectDescriptor>, SyncError> {
    let mut objects = Vec::new();
    let mut page_token: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .list_page(bucket, prefix, page_token.as_deref())
            .await
            .map_err(|source| SyncError::Listing {
                prefix: prefix.to_string(),
                source,
            })?;
        pages += 1;
        objects.extend(page.objects);

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    debug!(bucket, prefix, pages, objects = objects.len(), "Listed objects");
    Ok(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use crate::store::{ObjectBody, ObjectPage};
    use async_trait::async_trait;

    struct DeniedStore;

    #[async_trait]
    impl ObjectStore for DeniedStore {
        async fn list_page(
            &self,
            _bucket: &str,
            _prefix: &str,
            _page_token: Option<&str>,
        ) -> Result<ObjectPage, StoreError> {
            Err(StoreError::PermissionDenied("bucket bkt: token expired".into()))
        }

        async fn get_object(&self, _bucket: &str, key: &str) -> Result<ObjectBody, StoreError> {
            Err(StoreError::NotFound(key.to_string()))
        }

        async fn put_object(
            &self,
            _bucket: &str,
            _key: &str,
            _data: Vec<u8>,
            _create_only: bool,
        ) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[test]
    fn test_directory_prefix() {
        assert_eq!(directory_prefix("runs/42/ckpt"), "runs/42/ckpt/");
        assert_eq!(directory_prefix("runs/42/ckpt//"), "runs/42/ckpt/");
        assert_eq!(directory_prefix(""), "");
        assert_eq!(directory_prefix("/"), "");
    }

    #[tokio::test]
    async fn test_flattens_all_pages_recursively() {
        let store = MemoryStore::with_page_size(2);
        let keys = [
            "runs/42/ckpt/a.bin",
            "runs/42/ckpt/b.bin",
            "runs/42/ckpt/sub/c.bin",
            "runs/42/ckpt/sub/deeper/d.bin",
            "runs/42/ckpt2/other.bin",
        ];
        for key in keys {
            store.insert("bkt", key, vec![1u8; 3]).await;
        }

        let listed = list_objects(&store, "bkt", &directory_prefix("runs/42/ckpt"))
            .await
            .unwrap();
        let listed: Vec<&str> = listed.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(listed, &keys[..4]);
    }

    #[tokio::test]
    async fn test_empty_prefix_listing() {
        let store = MemoryStore::new();
        store.insert("bkt", "x", "1").await;
        assert!(list_objects(&store, "bkt", "nothing/here/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_store_error_becomes_listing_error() {
        let err = list_objects(&DeniedStore, "bkt", "runs/1/").await.unwrap_err();
        match err {
            SyncError::Listing { prefix, source } => {
                assert_eq!(prefix, "runs/1/");
                assert!(matches!(source, StoreError::PermissionDenied(_)));
            }
            other => panic!("expected Listing, got {:?}", other),
        }
    }
}
