//! Object storage backends.
//!
//! The pipeline only needs three calls from a store: download an object to
//! a local file, upload a local file with a content type, and delete an
//! object. [`S3Storage`] talks to S3 (or anything S3-compatible) with the
//! ambient credentials of the process; [`LocalStorage`] maps buckets onto
//! directories and is used for local runs and tests.

mod local;
mod s3;

pub use local::LocalStorage;
pub use s3::S3Storage;

use async_trait::async_trait;
use std::{io, path::Path};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("{operation} failed for `{bucket}/{key}`")]
    Transport {
        operation: &'static str,
        bucket: String,
        key: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Download `bucket/key` into `dest`, creating or truncating it.
    /// Returns the number of bytes written.
    async fn get_object_to_file(&self, bucket: &str, key: &str, dest: &Path)
    -> StorageResult<u64>;

    /// Upload the contents of `src` to `bucket/key`.
    async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        src: &Path,
        content_type: Option<&str>,
    ) -> StorageResult<()>;

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;
}
