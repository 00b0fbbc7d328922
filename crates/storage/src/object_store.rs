//! Object storage interface (S3/MinIO, local directory, in-memory).

use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{
    aws::AmazonS3Builder, local::LocalFileSystem, memory::InMemory, path::Path, ObjectStore,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, instrument};

use cog_common::{CogError, CogResult};

/// Which store an [`ObjectStorage`] talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    S3,
    Local,
    Memory,
}

/// Configuration for object storage connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectStorageConfig {
    pub backend: StorageBackend,
    /// S3/MinIO endpoint URL; `None` uses the AWS default
    pub endpoint: Option<String>,
    /// Bucket name (also used as the URI authority for the other backends)
    pub bucket: String,
    /// Access key ID; falls back to the AWS credential chain when unset
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub region: String,
    /// Allow HTTP (for local MinIO)
    pub allow_http: bool,
    /// Root directory for the local backend
    pub root: Option<PathBuf>,
}

impl Default for ObjectStorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            endpoint: None,
            bucket: "ghgc-data-store-dev".to_string(),
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            region: "us-west-2".to_string(),
            allow_http: false,
            root: None,
        }
    }
}

impl ObjectStorageConfig {
    /// S3 configuration from `S3_ENDPOINT`, `S3_BUCKET`, `AWS_ACCESS_KEY_ID`,
    /// `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN`, `AWS_REGION` and
    /// `S3_ALLOW_HTTP`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend: StorageBackend::S3,
            endpoint: env::var("S3_ENDPOINT").ok().filter(|v| !v.is_empty()),
            bucket: env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            access_key_id: env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_access_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            session_token: env::var("AWS_SESSION_TOKEN").ok(),
            region: env::var("AWS_REGION").unwrap_or(defaults.region),
            allow_http: env::var("S3_ALLOW_HTTP")
                .map(|v| v == "true")
                .unwrap_or(false),
            root: None,
        }
    }

    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackend::Local,
            bucket: "local".to_string(),
            root: Some(root.into()),
            ..Default::default()
        }
    }

    pub fn memory(bucket: impl Into<String>) -> Self {
        Self {
            backend: StorageBackend::Memory,
            bucket: bucket.into(),
            ..Default::default()
        }
    }
}

/// A listed object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: usize,
}

impl ObjectInfo {
    /// Final path segment of the key.
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// Object storage client for COGs and pipeline outputs.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    backend: StorageBackend,
    bucket: String,
    root: Option<PathBuf>,
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("backend", &self.backend)
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl ObjectStorage {
    /// Create a new object storage client from config.
    pub fn new(config: &ObjectStorageConfig) -> CogResult<Self> {
        let store: Arc<dyn ObjectStore> = match config.backend {
            StorageBackend::S3 => {
                let mut builder = AmazonS3Builder::from_env()
                    .with_bucket_name(&config.bucket)
                    .with_region(&config.region);

                if let Some(endpoint) = &config.endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if let Some(key) = &config.access_key_id {
                    builder = builder.with_access_key_id(key);
                }
                if let Some(secret) = &config.secret_access_key {
                    builder = builder.with_secret_access_key(secret);
                }
                if let Some(token) = &config.session_token {
                    builder = builder.with_token(token);
                }
                if config.allow_http {
                    builder = builder.with_allow_http(true);
                }

                let store = builder.build().map_err(|e| {
                    CogError::StorageError(format!("Failed to create S3 client: {}", e))
                })?;
                Arc::new(store)
            }
            StorageBackend::Local => {
                let root = config.root.as_ref().ok_or_else(|| {
                    CogError::StorageError("local backend requires a root directory".to_string())
                })?;
                std::fs::create_dir_all(root)?;
                let store = LocalFileSystem::new_with_prefix(root).map_err(|e| {
                    CogError::StorageError(format!(
                        "Failed to open {}: {}",
                        root.display(),
                        e
                    ))
                })?;
                Arc::new(store)
            }
            StorageBackend::Memory => Arc::new(InMemory::new()),
        };

        debug!(backend = ?config.backend, bucket = %config.bucket, "Created object storage");

        Ok(Self {
            store,
            backend: config.backend,
            bucket: config.bucket.clone(),
            root: config.root.clone(),
        })
    }

    /// In-memory store, used by tests and dry runs.
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            backend: StorageBackend::Memory,
            bucket: bucket.into(),
            root: None,
        }
    }

    pub fn backend(&self) -> StorageBackend {
        self.backend
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Write bytes to a key.
    #[instrument(skip(self, data), fields(bucket = %self.bucket, key = %key))]
    pub async fn put(&self, key: &str, data: Bytes) -> CogResult<()> {
        let location = Path::from(key);
        debug!(size = data.len(), "Writing object");

        self.store
            .put(&location, data)
            .await
            .map_err(|e| CogError::StorageError(format!("Failed to write {}: {}", key, e)))?;

        Ok(())
    }

    /// Read all bytes of a key.
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    pub async fn get(&self, key: &str) -> CogResult<Bytes> {
        let location = Path::from(key);

        let result = self.store.get(&location).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => CogError::NotFound(key.to_string()),
            e => CogError::StorageError(format!("Failed to read {}: {}", key, e)),
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| CogError::StorageError(format!("Failed to read bytes: {}", e)))?;

        debug!(size = bytes.len(), "Read object");
        Ok(bytes)
    }

    /// Check if an object exists.
    pub async fn exists(&self, key: &str) -> CogResult<bool> {
        let location = Path::from(key);

        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(CogError::StorageError(format!(
                "Failed to check {}: {}",
                key, e
            ))),
        }
    }

    /// List objects under a prefix, sorted by key. An empty prefix lists
    /// the whole store.
    #[instrument(skip(self), fields(bucket = %self.bucket))]
    pub async fn list(&self, prefix: &str) -> CogResult<Vec<ObjectInfo>> {
        let prefix = prefix.trim_matches('/');
        let prefix_path = (!prefix.is_empty()).then(|| Path::from(prefix));

        let mut objects = Vec::new();
        let mut stream = self.store.list(prefix_path.as_ref());
        while let Some(meta) = stream
            .try_next()
            .await
            .map_err(|e| CogError::StorageError(format!("List failed: {}", e)))?
        {
            objects.push(ObjectInfo {
                key: meta.location.to_string(),
                size: meta.size,
            });
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        debug!(prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    /// Delete an object.
    #[instrument(skip(self), fields(bucket = %self.bucket, key = %key))]
    pub async fn delete(&self, key: &str) -> CogResult<()> {
        let location = Path::from(key);

        self.store
            .delete(&location)
            .await
            .map_err(|e| CogError::StorageError(format!("Failed to delete {}: {}", key, e)))?;

        Ok(())
    }

    /// Fully qualified location of a key, as recorded in catalog assets.
    pub fn uri(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        match self.backend {
            StorageBackend::S3 => format!("s3://{}/{}", self.bucket, key),
            StorageBackend::Local => match &self.root {
                Some(root) => format!("{}", root.join(key).display()),
                None => key.to_string(),
            },
            StorageBackend::Memory => format!("memory://{}/{}", self.bucket, key),
        }
    }
}

/// Path builder for consistent storage layout.
pub struct StoragePath;

impl StoragePath {
    fn join(prefix: &str, name: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{}/{}", prefix, name)
        }
    }

    /// Format: {prefix}/{cog_filename}
    pub fn cog(prefix: &str, filename: &str) -> String {
        Self::join(prefix, filename)
    }

    /// Format: {prefix}/metadata.json
    pub fn metadata_json(prefix: &str) -> String {
        Self::join(prefix, "metadata.json")
    }

    /// Format: {prefix}/files_converted.csv
    pub fn files_converted(prefix: &str) -> String {
        Self::join(prefix, "files_converted.csv")
    }
}
