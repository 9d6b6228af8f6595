//! Caller-facing artifact store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::gcs::GcsStore;
use crate::layout::RunPath;
use crate::mapping::map_remote_key;
use crate::orchestrator::{plan_directory, sync_directory, SyncOptions};
use crate::store::ObjectStore;
use crate::transfer;
use crate::types::{StorageLocation, TransferPair};

/// Moves model artifacts between one bucket and local disk.
///
/// # Example
///
/// ```no_run
/// use artifact_sync::{ArtifactStore, RunPath, SyncConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SyncConfig::builder("mf-models-test1", "mlops-inference-nonprod").build()?;
/// let store = ArtifactStore::new(config)?;
///
/// let run = RunPath::new("CodeAutocompletionFlow", "107");
/// store
///     .fetch_run_directory(&run, "trained/checkpoint-2", "./models/checkpoint-500".as_ref())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ArtifactStore {
    store: Arc<dyn ObjectStore>,
    config: SyncConfig,
}

impl ArtifactStore {
    /// Creates a store backed by Google Cloud Storage.
    pub fn new(config: SyncConfig) -> Result<Self, SyncError> {
        let gcs = GcsStore::new(&config)?;
        Ok(Self::with_store(config, Arc::new(gcs)))
    }

    /// Creates a store on top of any backend.
    pub fn with_store(config: SyncConfig, store: Arc<dyn ObjectStore>) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn location(&self, key: &str) -> StorageLocation {
        StorageLocation::new(self.config.bucket(), key)
    }

    fn options(&self) -> SyncOptions {
        SyncOptions {
            max_workers: self.config.max_workers(),
            show_progress: self.config.show_progress(),
        }
    }

    /// Downloads every object under `remote_prefix` into `local_root`.
    pub async fn fetch_directory(
        &self,
        remote_prefix: &str,
        local_root: &Path,
    ) -> Result<PathBuf, SyncError> {
        sync_directory(
            Arc::clone(&self.store),
            self.config.bucket(),
            remote_prefix,
            local_root,
            self.options(),
        )
        .await
    }

    /// Lists and plans a directory sync without transferring anything.
    pub async fn plan_directory(
        &self,
        remote_prefix: &str,
        local_root: &Path,
    ) -> Result<Vec<TransferPair>, SyncError> {
        plan_directory(
            self.store.as_ref(),
            self.config.bucket(),
            remote_prefix,
            local_root,
        )
        .await
    }

    /// Downloads one object, overwriting `local_path`.
    pub async fn fetch_object(&self, key: &str, local_path: &Path) -> Result<u64, SyncError> {
        transfer::fetch_object(self.store.as_ref(), &self.location(key), local_path).await
    }

    /// Uploads one object; fails if `key` already exists.
    pub async fn store_object(
        &self,
        data: Vec<u8>,
        key: &str,
    ) -> Result<StorageLocation, SyncError> {
        let location = self.location(key);
        transfer::store_object(self.store.as_ref(), &location, data).await?;
        Ok(location)
    }

    /// Stores `data` as `file_name` of a run and returns its key.
    pub async fn store_run_file(
        &self,
        run: &RunPath,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<String, SyncError> {
        let key = run.file_key(file_name);
        self.store_object(data, &key).await?;
        Ok(key)
    }

    /// Fetches `file_name` of a run to `local_root/{flow}/{run}/{file_name}`.
    ///
    /// Names with `.` or `..` segments fail with [`SyncError::InvalidKey`].
    pub async fn fetch_run_file(
        &self,
        run: &RunPath,
        file_name: &str,
        local_root: &Path,
    ) -> Result<PathBuf, SyncError> {
        let key = run.file_key(file_name);
        let local_path = map_remote_key(&key, "", local_root)?;
        self.fetch_object(&key, &local_path).await?;
        Ok(local_path)
    }

    /// Syncs the `subdir` "directory" of a run into `local_dir`.
    pub async fn fetch_run_directory(
        &self,
        run: &RunPath,
        subdir: &str,
        local_dir: &Path,
    ) -> Result<PathBuf, SyncError> {
        self.fetch_directory(&run.directory_prefix(subdir), local_dir)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn artifact_store() -> (ArtifactStore, Arc<MemoryStore>) {
        let memory = Arc::new(MemoryStore::new());
        let config = SyncConfig::builder("bkt", "proj")
            .max_workers(4)
            .build()
            .unwrap();
        let store = ArtifactStore::with_store(config, memory.clone());
        (store, memory)
    }

    #[tokio::test]
    async fn test_run_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _memory) = artifact_store();
        let run = RunPath::new("TrainingFlowBQ", "37");

        let key = store
            .store_run_file(&run, "model.bin", b"weights".to_vec())
            .await
            .unwrap();
        assert_eq!(key, "TrainingFlowBQ/37/model.bin");

        let local = store
            .fetch_run_file(&run, "model.bin", dir.path())
            .await
            .unwrap();
        assert_eq!(local, dir.path().join("TrainingFlowBQ/37/model.bin"));
        assert_eq!(std::fs::read(local).unwrap(), b"weights");

        let err = store
            .store_run_file(&run, "model.bin", b"other".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_fetch_run_file_stays_under_local_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("cache");
        let (store, memory) = artifact_store();
        memory.insert("bkt", "x", "escaped").await;

        let run = RunPath::new("Flow", "1");
        let err = store
            .fetch_run_file(&run, "../../x", &root)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::InvalidKey { .. }));
        assert!(!dir.path().join("x").exists());
    }

    #[tokio::test]
    async fn test_fetch_run_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (store, memory) = artifact_store();
        memory
            .insert("bkt", "CodeAutocompletionFlow/107/trained/checkpoint-2/adapter_config.json", "{}")
            .await;
        memory
            .insert("bkt", "CodeAutocompletionFlow/107/trained/checkpoint-2/adapter_model.bin", "w")
            .await;
        memory
            .insert("bkt", "CodeAutocompletionFlow/107/trained/checkpoint-20/other.bin", "x")
            .await;

        let run = RunPath::new("CodeAutocompletionFlow", "107");
        let root = dir.path().join("checkpoint-500");
        let synced = store
            .fetch_run_directory(&run, "trained/checkpoint-2", &root)
            .await
            .unwrap();

        assert_eq!(synced, root);
        assert!(root.join("adapter_config.json").is_file());
        assert!(root.join("adapter_model.bin").is_file());
        assert!(!root.join("other.bin").exists());
    }
}
