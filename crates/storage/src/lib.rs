//! Object storage for converted COGs and their pipeline reports.
//!
//! One [`ObjectStorage`] type fronts three backends:
//! - S3-compatible buckets (AWS, MinIO)
//! - a local directory
//! - an in-memory store for tests and dry runs

pub mod object_store;

pub use self::object_store::{
    ObjectInfo, ObjectStorage, ObjectStorageConfig, StorageBackend, StoragePath,
};
