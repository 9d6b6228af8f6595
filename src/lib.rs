//! artifact-sync - Move trained-model artifacts between a bucket and local disk
//!
//! This library fetches whole "directories" (key prefixes) of a Google Cloud
//! Storage bucket in parallel, and stores or fetches single objects.
//!
//! # Features
//!
//! - **Parallel Directory Sync**: Bounded worker pool, one outcome per object
//! - **All-or-Nothing Result**: Any failed object fails the sync, naming every failure
//! - **Folder Marker Filtering**: Zero-byte placeholder objects are never downloaded
//! - **Integrity Checks**: Size and MD5 verification of every download
//! - **Write-Once Uploads**: Stores refuse to replace existing objects
//!
//! # Example
//!
//! ```no_run
//! use artifact_sync::{ArtifactStore, SyncConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::builder("mf-models-test1", "mlops-inference-nonprod").build()?;
//! let store = ArtifactStore::new(config)?;
//!
//! store.fetch_directory("TrainingFlowBQ/37", "./test-model/checkpoint".as_ref()).await?;
//! # Ok(())
//! # }
//! ```

mod artifact_store;
mod config;
mod download;
mod error;
mod gcs;
mod layout;
mod lister;
mod mapping;
mod memory;
mod orchestrator;
mod parallel;
mod plan;
mod store;
mod transfer;
mod types;

pub use artifact_store::ArtifactStore;
pub use config::{
    parse_duration, ConfigFile, SyncConfig, SyncConfigBuilder, DEFAULT_ENDPOINT,
    DEFAULT_MAX_WORKERS, MAX_WORKERS_LIMIT,
};
pub use download::download_object;
pub use error::{DirectorySyncError, FailedTransfer, StoreError, SyncError, TransferError};
pub use gcs::GcsStore;
pub use layout::RunPath;
pub use lister::{directory_prefix, list_objects};
pub use mapping::map_remote_key;
pub use memory::MemoryStore;
pub use orchestrator::{plan_directory, sync_directory, SyncOptions};
pub use parallel::download_plan;
pub use plan::build_plan;
pub use store::{ObjectBody, ObjectPage, ObjectStore};
pub use transfer::{fetch_object, store_object};
pub use types::{
    ObjectDescriptor, StorageLocation, TransferOutcome, TransferPair, TransferReport,
};
