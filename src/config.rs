//! Sync configuration.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::error::SyncError;

/// Default worker-pool size for directory sync.
pub const DEFAULT_MAX_WORKERS: usize = 16;

/// Upper bound on the worker-pool size.
pub const MAX_WORKERS_LIMIT: usize = 256;

/// Public Google Cloud Storage endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

/// Validated configuration for an [`ArtifactStore`](crate::ArtifactStore).
///
/// # Example
///
/// ```
/// use artifact_sync::SyncConfig;
///
/// let config = SyncConfig::builder("mf-models-test1", "mlops-inference-nonprod")
///     .max_workers(8)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_workers(), 8);
/// ```
#[derive(Clone)]
pub struct SyncConfig {
    bucket: String,
    project: String,
    max_workers: usize,
    endpoint: Url,
    access_token: Option<String>,
    connect_timeout: Option<Duration>,
    show_progress: bool,
}

impl SyncConfig {
    pub fn builder(bucket: impl Into<String>, project: impl Into<String>) -> SyncConfigBuilder {
        SyncConfigBuilder::new(bucket, project)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Maximum number of concurrent object downloads.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn access_token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    /// Whether directory syncs draw a progress bar.
    pub fn show_progress(&self) -> bool {
        self.show_progress
    }
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("bucket", &self.bucket)
            .field("project", &self.project)
            .field("max_workers", &self.max_workers)
            .field("endpoint", &self.endpoint.as_str())
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout", &self.connect_timeout)
            .field("show_progress", &self.show_progress)
            .finish()
    }
}

/// Builder for [`SyncConfig`]; all checks run in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SyncConfigBuilder {
    bucket: String,
    project: String,
    max_workers: usize,
    endpoint: String,
    access_token: Option<String>,
    connect_timeout: Option<Duration>,
    show_progress: bool,
}

impl SyncConfigBuilder {
    pub fn new(bucket: impl Into<String>, project: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            project: project.into(),
            max_workers: DEFAULT_MAX_WORKERS,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            connect_timeout: None,
            show_progress: false,
        }
    }

    pub fn max_workers(mut self, n: usize) -> Self {
        self.max_workers = n;
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn show_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    pub fn build(self) -> Result<SyncConfig, SyncError> {
        validate_bucket(&self.bucket)?;

        if self.project.trim().is_empty() {
            return Err(SyncError::Config("project is required".into()));
        }
        if !self.project.chars().all(|c| c.is_ascii_graphic()) {
            return Err(SyncError::Config(format!(
                "project '{}' must be printable ASCII without spaces",
                self.project
            )));
        }

        if self.max_workers == 0 || self.max_workers > MAX_WORKERS_LIMIT {
            return Err(SyncError::Config(format!(
                "max_workers must be between 1 and {}, got {}",
                MAX_WORKERS_LIMIT, self.max_workers
            )));
        }

        let endpoint = Url::parse(&self.endpoint)
            .map_err(|e| SyncError::Config(format!("invalid endpoint '{}': {}", self.endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") || endpoint.cannot_be_a_base() {
            return Err(SyncError::Config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if let Some(token) = &self.access_token {
            if !token.chars().all(|c| c.is_ascii_graphic()) {
                return Err(SyncError::Config(
                    "access token must be printable ASCII without spaces".into(),
                ));
            }
        }

        Ok(SyncConfig {
            bucket: self.bucket,
            project: self.project,
            max_workers: self.max_workers,
            endpoint,
            access_token: self.access_token,
            connect_timeout: self.connect_timeout,
            show_progress: self.show_progress,
        })
    }
}

fn validate_bucket(bucket: &str) -> Result<(), SyncError> {
    if bucket.is_empty() {
        return Err(SyncError::Config("bucket is required".into()));
    }
    if bucket.contains('/') || bucket.chars().any(char::is_whitespace) {
        return Err(SyncError::Config(format!(
            "bucket '{}' must not contain '/' or whitespace",
            bucket
        )));
    }
    Ok(())
}

/// On-disk configuration, every field optional so CLI flags can fill gaps.
///
/// ```json
/// {
///   "bucket": "mf-models-test1",
///   "project": "mlops-inference-nonprod",
///   "max_workers": 16,
///   "connect_timeout": "10s"
/// }
/// ```
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub bucket: Option<String>,
    pub project: Option<String>,
    pub max_workers: Option<usize>,
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    /// Humantime duration, e.g. `"10s"`.
    pub connect_timeout: Option<String>,
}

impl ConfigFile {
    pub fn from_path(path: &Path) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SyncError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&content)
            .map_err(|e| SyncError::Config(format!("invalid {}: {}", path.display(), e)))
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }

    pub fn connect_timeout(&self) -> Result<Option<Duration>, SyncError> {
        self.connect_timeout
            .as_deref()
            .map(parse_duration)
            .transpose()
    }
}

/// Parses a humantime duration such as `30s` or `1m 30s`.
pub fn parse_duration(value: &str) -> Result<Duration, SyncError> {
    humantime::parse_duration(value)
        .map_err(|e| SyncError::Config(format!("invalid duration '{}': {}", value, e)))
}
